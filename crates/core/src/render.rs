//! User-facing reply text. Everything returned here is Telegram HTML with
//! user content escaped.

use crate::domain::record::Record;
use crate::text::{escape_html, is_dash_variant, normalize_key};

pub const CHUNK_CHARS: usize = 3800;

const NUMBER_EMOJI: [&str; 11] =
    ["0️⃣", "1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣", "6️⃣", "7️⃣", "8️⃣", "9️⃣", "🔟"];

const DEFAULT_ICON: &str = "📌";

/// Keyword stems checked against the start of each word of the normalized key.
const ICON_RULES: &[(&str, &[&str])] = &[
    ("🎂", &["cumple", "birthday", "bday"]),
    ("🩺", &["cita", "medico", "dentista", "pediatra", "doctor", "dentist"]),
    ("🔐", &["wifi", "clave", "password", "pass", "pin", "contrasena"]),
    ("🛒", &["compra", "super", "lista", "shopping", "grocer"]),
    ("🚗", &["matricula", "coche", "car", "plate"]),
    ("🧾", &["factura", "luz", "gas", "agua", "bill", "invoice"]),
    ("👟", &["talla", "zapat", "ropa", "size", "shoe"]),
    ("🛡️", &["seguro", "poliza", "insurance", "policy"]),
    ("✈️", &["vuelo", "billete", "tren", "avion", "flight", "train"]),
    ("📦", &["pedido", "amazon", "correos", "envio", "order", "parcel"]),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageAction {
    Save,
    Query,
    Edit,
    Delete,
    List,
}

impl StorageAction {
    fn gerund(&self) -> &'static str {
        match self {
            Self::Save => "guardando",
            Self::Query => "consultando",
            Self::Edit => "actualizando",
            Self::Delete => "borrando",
            Self::List => "listando",
        }
    }
}

pub fn number_emoji(n: u64) -> &'static str {
    usize::try_from(n).ok().and_then(|index| NUMBER_EMOJI.get(index)).copied().unwrap_or("•")
}

pub fn title_case(key_text: &str) -> String {
    let trimmed = key_text.trim().trim_start_matches('#').trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn icon_for_key(key_text: &str) -> &'static str {
    let normalized = normalize_key(key_text);
    let words: Vec<&str> =
        normalized.split(|ch: char| !ch.is_alphanumeric()).filter(|word| !word.is_empty()).collect();

    ICON_RULES
        .iter()
        .find(|(_, stems)| {
            words.iter().any(|word| stems.iter().any(|stem| word.starts_with(stem)))
        })
        .map(|(icon, _)| *icon)
        .unwrap_or(DEFAULT_ICON)
}

/// Splits a value into list items. A value that is not list-like comes back
/// as a single item.
pub fn list_items(value: &str) -> Vec<String> {
    let value = value.trim();
    if value.is_empty() {
        return Vec::new();
    }

    if value.contains('\n') {
        return value
            .lines()
            .map(|line| strip_item_marker(line.trim()))
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
    }

    let marked = split_on_inline_markers(value);
    if marked.len() >= 2 {
        return marked;
    }

    let separated: Vec<String> = value
        .split([';', '|'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect();
    if separated.len() >= 2 {
        return separated;
    }

    vec![value.to_owned()]
}

fn is_number_marker(word: &str) -> bool {
    let digits = word.trim_end_matches(['.', ')']);
    digits.len() + 1 == word.len() && !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit())
}

fn is_bullet_marker(word: &str) -> bool {
    let mut chars = word.chars();
    matches!((chars.next(), chars.next()), (Some(ch), None) if ch == '•' || ch == '·' || is_dash_variant(ch))
}

fn strip_item_marker(line: &str) -> &str {
    let Some(first) = line.split_whitespace().next() else {
        return line;
    };
    if is_number_marker(first) || is_bullet_marker(first) {
        return line[first.len()..].trim_start();
    }

    // "-item" / "•item" without a space after the bullet
    let mut chars = line.chars();
    match chars.next() {
        Some(ch) if ch == '•' || ch == '·' || is_dash_variant(ch) => chars.as_str().trim_start(),
        _ => line,
    }
}

fn split_on_inline_markers(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut saw_marker = false;

    for word in value.split_whitespace() {
        if is_number_marker(word) || is_bullet_marker(word) {
            saw_marker = true;
            if !current.is_empty() {
                items.push(current.join(" "));
                current.clear();
            }
            continue;
        }
        current.push(word);
    }
    if !current.is_empty() {
        items.push(current.join(" "));
    }

    if saw_marker {
        items
    } else {
        Vec::new()
    }
}

fn bullets(items: &[String]) -> String {
    items.iter().map(|item| format!("• {}", escape_html(item))).collect::<Vec<_>>().join("\n")
}

/// `#Key icon — value` on one line, or the title followed by bullets when the
/// value is a list.
pub fn render_inline(key_text: &str, value: &str) -> String {
    let title = format!("#{}", key_text.trim().trim_start_matches('#'));
    let icon = icon_for_key(key_text);
    let items = list_items(value);

    match items.as_slice() {
        [single] => format!("<b>{}</b> {icon} — {}", escape_html(&title), escape_html(single)),
        _ => format!("<b>{}</b> {icon}\n{}", escape_html(&title), bullets(&items)),
    }
}

/// Numbered card used for listings and multi-hit queries.
pub fn render_card(key_text: &str, value: &str, position: u64) -> String {
    format!(
        "{} <b>{}</b> {}\n{}",
        number_emoji(position),
        escape_html(&title_case(key_text)),
        icon_for_key(key_text),
        bullets(&list_items(value))
    )
}

pub fn pluralize(count: u64, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 {singular}")
    } else {
        format!("{count} {plural}")
    }
}

pub fn total_pages(total: u64, page_size: u32) -> u64 {
    let page_size = u64::from(page_size.max(1));
    total.div_ceil(page_size).max(1)
}

pub fn page_offset(page: u32, page_size: u32) -> u64 {
    u64::from(page.max(1) - 1).saturating_mul(u64::from(page_size))
}

pub fn saved(record: &Record) -> String {
    format!("✅ Guardado:\n{}", render_inline(&record.key_text, &record.value))
}

pub fn updated(record: &Record) -> String {
    format!("📝 Actualizado:\n{} ✅", render_inline(&record.key_text, &record.value))
}

pub fn deleted(record: &Record) -> String {
    format!("🗑️ Borrado: \"{}\"", escape_html(&record.key_text))
}

pub fn delete_not_found(key: &str) -> String {
    format!("⚠️ No había nada con \"{}\"", escape_html(key))
}

pub fn edit_not_found(key: &str) -> String {
    format!("⚠️ No encontré \"{}\"", escape_html(key))
}

pub fn edit_help(key: &str) -> String {
    if key.is_empty() {
        return "Falta el nombre del recordatorio.\nFormato: ?+nombre - nuevo valor\nEj.: ?+\"cumple john\" - 11/12"
            .to_owned();
    }
    format!(
        "Formato: ?+{} - nuevo valor\nEj.: ?+\"cumple john\" - 11/12",
        escape_html(key)
    )
}

pub fn query_results(query: &str, records: &[Record]) -> String {
    match records {
        [] => format!("⚠️ No encontré \"{}\"", escape_html(query)),
        [single] => format!("🔍 {}", render_inline(&single.key_text, &single.value)),
        many => {
            let cards = many
                .iter()
                .zip(1u64..)
                .map(|(record, position)| render_card(&record.key_text, &record.value, position))
                .collect::<Vec<_>>()
                .join("\n\n");
            format!("🔎 <b>{}</b>\n\n{cards}", pluralize(many.len() as u64, "coincidencia", "coincidencias"))
        }
    }
}

/// One page of the full listing. Numbering continues across pages.
pub fn list_page(page: u32, page_size: u32, total: u64, records: &[Record]) -> String {
    if records.is_empty() {
        return if page <= 1 {
            "📭 No tienes registros aún.".to_owned()
        } else {
            format!("📭 Página {page} vacía.")
        };
    }

    let pages = total_pages(total, page_size);
    let first_position = page_offset(page, page_size).saturating_add(1);
    let header = format!("🗂️ Tus registros (página {page}/{pages}, total {total})");
    let body = records
        .iter()
        .zip(first_position..)
        .map(|(record, position)| render_card(&record.key_text, &record.value, position))
        .collect::<Vec<_>>()
        .join("\n\n");

    if u64::from(page) < pages {
        format!(
            "{header}\n\n{body}\n\n➡️ Usa <code>?* {}</code> para la siguiente página.",
            page.saturating_add(1)
        )
    } else {
        format!("{header}\n\n{body}")
    }
}

pub fn unrecognized() -> String {
    "⚠️ Perdona, ese formato no me suena. Usa:\n\
     #nombre - valor  (— o – también valen)\n\
     Consultar: ?nombre  |  Listar: ?*\n\
     Editar: ?+nombre - nuevo valor  |  Borrar: -nombre"
        .to_owned()
}

pub fn storage_error(action: StorageAction, subject: Option<&str>, detail: &str) -> String {
    match subject {
        Some(subject) => format!(
            "⚠️ Error {} \"{}\": {}",
            action.gerund(),
            escape_html(subject),
            escape_html(detail)
        ),
        None => format!("⚠️ Error {}: {}", action.gerund(), escape_html(detail)),
    }
}

pub fn welcome_message() -> &'static str {
    "👋 ¡Hola! Soy <b>Reco</b>, tu micro-asistente en el chat para recordar cualquier dato simple.\n\n\
     📌 <b>¿Qué puedo hacer por ti?</b>\n\
     • Guardar cumpleaños, claves, citas, notas rápidas… lo que quieras.\n\
     • Consultar cualquier dato en segundos.\n\
     • Editar y borrar cuando cambien las cosas.\n\
     • Listar todo lo tuyo en una sola página.\n\n\
     <b>Comandos básicos:</b>\n\
     #nombre - valor   → guardar\n\
     ?nombre           → consultar\n\
     ?+nombre - valor  → editar\n\
     -nombre           → borrar\n\
     ?*                → listar todo\n\n\
     <b>Ejemplos:</b>\n\
     • #tel mamá - 612345679\n\
     • #candado bici - 1234\n\
     • #cita médico - 12/10 10:00h\n\
     • #matrícula coche - 1234ABC\n\
     • #wifi casa - PepeWifi / clave123\n\n\
     💡 Guarda <b>ahora mismo</b> el dato que más veces repites (wifi, matrícula, clave bici).\n\n\
     ¿Ideas o fallos? Escríbeme con /feedback."
}

pub fn help_message() -> &'static str {
    "<b>Cómo usar Reco</b>\n\
     • Guardar: #nombre - valor\n\
     • Consultar: ?nombre\n\
     • Editar: ?+nombre - nuevo valor\n\
     • Borrar: -nombre\n\
     • Borrar todo: escribe \"borrar todo\" o \"borra todo\" (te pediré confirmación)\n\
     • Listar: ?*\n\n\
     Ej.: #wifi casa - PepeWifi / clave123"
}

/// Splits `text` into chunks of at most `max_chars` characters, order preserved.
/// A cut lands on the last line break that fits, else on a space, and never
/// inside a tag, an open `<b>…</b>` pair or a character entity.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let remaining = chars.len() - start;
        let cut = if remaining <= max_chars {
            remaining
        } else {
            markup_safe_cut(&chars[start..=start + max_chars]).unwrap_or(max_chars)
        };

        let chunk: String = chars[start..start + cut].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_owned());
        }
        start += cut;
    }
    chunks
}

/// Best cut offset within `window`, whose last char is one past the size
/// limit. `None` when every position sits inside markup.
fn markup_safe_cut(window: &[char]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_tag = false;
    let mut closing = false;
    let mut in_entity = false;
    let (mut newline, mut space, mut clean) = (None, None, None);

    for (index, ch) in window.iter().enumerate() {
        if index > 0 && !in_tag && !in_entity && depth == 0 {
            clean = Some(index);
            match ch {
                '\n' => newline = Some(index),
                ' ' => space = Some(index),
                _ => {}
            }
        }

        match ch {
            '<' if !in_tag => {
                in_tag = true;
                closing = window.get(index + 1) == Some(&'/');
            }
            '>' if in_tag => {
                in_tag = false;
                if closing {
                    depth = depth.saturating_sub(1);
                } else {
                    depth += 1;
                }
            }
            '&' if !in_tag => in_entity = true,
            ';' if in_entity => in_entity = false,
            _ => {}
        }
    }

    newline.or(space).or(clean)
}
