//! Engagement rules: the PMF survey gate and the three re-activation nudges.
//! The rules only look at facts handed to them; fetching those facts from the
//! event log is the caller's job.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rand::Rng;

use crate::domain::event::EventKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PmfPolicy {
    pub debug_always: bool,
    pub min_distinct_days: usize,
    pub usage_window_days: i64,
    pub cooldown_days: i64,
}

impl Default for PmfPolicy {
    fn default() -> Self {
        Self { debug_always: false, min_distinct_days: 5, usage_window_days: 180, cooldown_days: 90 }
    }
}

impl PmfPolicy {
    pub fn usage_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.usage_window_days)
    }

    pub fn cooldown_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.cooldown_days)
    }

    pub fn evaluate(&self, distinct_days: usize, answered_recently: bool) -> PmfEligibility {
        PmfEligibility {
            distinct_days,
            answered_recently,
            debug_always: self.debug_always,
            min_distinct_days: self.min_distinct_days,
            cooldown_days: self.cooldown_days,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PmfEligibility {
    pub distinct_days: usize,
    pub answered_recently: bool,
    pub debug_always: bool,
    min_distinct_days: usize,
    cooldown_days: i64,
}

impl PmfEligibility {
    pub fn should_ask(&self) -> bool {
        self.debug_always
            || (!self.answered_recently && self.distinct_days >= self.min_distinct_days)
    }

    /// Plain-text diagnostics for `/debugpmf`.
    pub fn describe(&self) -> String {
        format!(
            "PMF debug:\n- Días distintos: {}\n- Contestó últimos {} días: {}\n- Forzar por config: {}\n→ {}",
            self.distinct_days,
            self.cooldown_days,
            self.answered_recently,
            if self.debug_always { "sí" } else { "no" },
            if self.should_ask() { "PREGUNTARÍA" } else { "NO preguntaría" }
        )
    }
}

/// Number of distinct calendar days, in `tz`, among `timestamps`.
pub fn distinct_local_days(timestamps: &[DateTime<Utc>], tz: Tz) -> usize {
    timestamps
        .iter()
        .map(|timestamp| timestamp.with_timezone(&tz).date_naive())
        .collect::<HashSet<_>>()
        .len()
}

pub fn pmf_prompt() -> &'static str {
    "🙏 Mini-encuesta: ¿Cuánto te molestaría NO poder usar Reco?\n(1 = nada, 5 = muchísimo)"
}

pub fn pmf_follow_up() -> &'static str {
    "🙏 Para ayudarme a mejorar, cuéntame AQUÍ MISMO en una frase: ¿qué echarías más de menos si no pudieras usar Reco?\n✍️ Escribe tu comentario debajo."
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NudgeKind {
    First,
    Second,
    Third,
}

impl NudgeKind {
    pub const ALL: [NudgeKind; 3] = [Self::First, Self::Second, Self::Third];

    pub fn event_kind(&self) -> EventKind {
        match self {
            Self::First => EventKind::Nudge1,
            Self::Second => EventKind::Nudge2,
            Self::Third => EventKind::Nudge3,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
            Self::Third => 3,
        }
    }

    /// The nudge that applies at exactly this many stored records.
    pub fn for_record_count(record_count: u64) -> Option<Self> {
        match record_count {
            0 => Some(Self::First),
            1 => Some(Self::Second),
            3 => Some(Self::Third),
            _ => None,
        }
    }

    /// Event whose latest occurrence starts the idle timer.
    pub fn idle_since_event(&self) -> EventKind {
        match self {
            Self::First => EventKind::Start,
            Self::Second | Self::Third => EventKind::Save,
        }
    }

    pub fn idle_for(&self) -> Duration {
        match self {
            Self::First => Duration::hours(24),
            Self::Second => Duration::hours(48),
            Self::Third => Duration::days(5),
        }
    }

    pub fn cooldown(&self) -> Duration {
        match self {
            Self::First => Duration::days(7),
            Self::Second => Duration::days(14),
            Self::Third => Duration::days(30),
        }
    }

    /// Whether the idle condition holds. No anchor event means no nudge.
    pub fn is_idle(&self, last_anchor: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_anchor.is_some_and(|at| now - at >= self.idle_for())
    }

    pub fn variants(&self) -> [&'static str; 2] {
        match self {
            Self::First => [NUDGE1_A, NUDGE1_B],
            Self::Second => [NUDGE2_A, NUDGE2_B],
            Self::Third => [NUDGE3_A, NUDGE3_B],
        }
    }

    pub fn pick_text<R: Rng + ?Sized>(&self, rng: &mut R) -> &'static str {
        let [first, second] = self.variants();
        if rng.gen_bool(0.5) {
            first
        } else {
            second
        }
    }
}

/// One message per nudge showing both variants, for the owner preview.
pub fn nudge_preview() -> Vec<String> {
    NudgeKind::ALL
        .iter()
        .map(|kind| {
            let [first, second] = kind.variants();
            format!("— Nudge {} —\n{first}\n\n— Nudge {} (variante) —\n{second}", kind.number(), kind.number())
        })
        .collect()
}

const NUDGE1_A: &str = "👋 ¡Hey! Aún no has guardado nada en Reco.\n\
Prueba con algo 100% cotidiano que usarás luego en segundos:\n\n\
• Lista corta de compra → <code>#compra octubre - 1. Plátanos 2. Huevos 3. Papel higiénico</code>\n\
• Cita dentista → <code>#cita dentista - 15/11 16:00h</code>\n\n\
Tu \"yo del futuro\" te lo va a agradecer 😅\n\
Escribe <code>?compra</code> o <code>?cita</code> para verlos y verás la magia.";

const NUDGE1_B: &str = "🤔 Si lo dejas en la cabeza... se pierde.\n\
Guarda 1 cosa útil ahora y pruébame con <code>?nombre</code>:\n\n\
• PIN parking → <code>#pin parking - 2781</code>\n\
• Pedido online → <code>#pedido Correos - 113-998877</code>\n\n\
5 segundos para guardar; 1 segundo para encontrar 😉\n\
Tip: con <code>?*</code> ves todo lo que llevas.";

const NUDGE2_A: &str = "🔓 Con 3 cositas guardadas Reco despega.\n\
Añade 2 más y búscalas rápido con <code>?nombre</code>.\n\
Inspiración rápida y muy real:\n\
• Wifi → <code>#wifi casa - PepeWifi / clave123</code>\n\
• Lista compra → <code>#compra - 1. Leche 2. Pan 3. Huevos</code>\n\
• Cita → <code>#cita pediatra - 10/10 09:30h</code>\n\n\
Tres toques y tienes memoria turbo 💪";

const NUDGE2_B: &str = "Ya guardaste 1 (¡bien!). Sube a 3 y verás la magia de <code>?*</code>.\n\
Ideas que salvan el día:\n\
• Matrícula → <code>#matrícula coche - 1234ABC</code>\n\
• Factura → <code>#factura luz - vence 12/11</code>\n\
• Extraescolar → <code>#clase inglés - lunes 17:30h</code>";

const NUDGE3_A: &str = "🧱 Con 3 ya vas rápido; con 4-5 es teletransporte.\n\
¿Qué te falta?\n\
• Seguro coche → <code>#seguro coche - póliza 998877</code>\n\
• NIF cliente → <code>#cliente X - NIF B-12345678</code>\n\
• Vuelo → <code>#vuelo Madrid - IB1234 salida 08:00</code>\n\
Ese \"lo tenía en la punta de la lengua\"… ya no 🤟";

const NUDGE3_B: &str = "Estás a 1 nota de convertir Reco en tu bolsillo pro.\n\
Añade una súper cotidiana y pruébame mañana:\n\n\
• Compra finde → <code>#compra finde - 1. Café 2. Arroz</code>\n\
• PIN que siempre olvidas → <code>#pin trastero - 5402</code>\n\n\
Prueba <code>?compra</code> y voilà 😄";
