//! UI-Kollaborator-Schnittstelle (§6 "Collaborator interfaces")
//!
//! Die Session-State-Machine kennt die konkrete Oberflaeche nicht; sie
//! ruft nur dieses schmale Trait auf. Struktur (Trait + No-op-Default-
//! Implementierung fuer Tests/Headless-Betrieb) folgt dem
//! Observer-Pattern aus `crates/chat/src/broadcast.rs` im Lehrer-Repo.

/// Seiten/Bildschirme, zwischen denen die Oberflaeche wechseln kann.
/// Entspricht 1:1 den `AppState`-Werten, ist aber bewusst ein eigener
/// Typ: die UI-Schicht soll nicht von `va_core::AppState` abhaengen
/// muessen, nur von dem, was sie tatsaechlich anzeigt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Init,
    Idle,
    Listening,
    Processing,
    Speaking,
    Error,
}

impl From<va_core::AppState> for Page {
    fn from(state: va_core::AppState) -> Self {
        match state {
            va_core::AppState::Init => Page::Init,
            va_core::AppState::Idle => Page::Idle,
            va_core::AppState::Listening => Page::Listening,
            va_core::AppState::Processing => Page::Processing,
            va_core::AppState::Speaking => Page::Speaking,
            va_core::AppState::Error => Page::Error,
        }
    }
}

/// Oberflaechen-Kollaborator (§6): Seite wechseln, Transkript fortschreiben
/// oder leeren, Pegel anzeigen, Fehler/Status melden.
pub trait SessionUi: Send + Sync {
    fn set_page(&self, page: Page);
    fn update_transcript(&self, text: &str, is_user: bool);
    fn clear_transcript(&self);
    fn update_audio_level(&self, level_0_100: u8);
    fn show_error(&self, text: &str);
    fn show_status(&self, text: &str, ok: bool);
}

/// Stille Implementierung fuer Tests und headless Betrieb: protokolliert
/// nur ueber `tracing`, zeigt aber nichts an.
pub struct NoopUi;

impl SessionUi for NoopUi {
    fn set_page(&self, page: Page) {
        tracing::debug!(?page, "Seite gewechselt (NoopUi)");
    }

    fn update_transcript(&self, text: &str, is_user: bool) {
        tracing::debug!(is_user, text, "Transkript aktualisiert (NoopUi)");
    }

    fn clear_transcript(&self) {
        tracing::debug!("Transkript geleert (NoopUi)");
    }

    fn update_audio_level(&self, level_0_100: u8) {
        tracing::trace!(level_0_100, "Pegel aktualisiert (NoopUi)");
    }

    fn show_error(&self, text: &str) {
        tracing::warn!(text, "Fehler angezeigt (NoopUi)");
    }

    fn show_status(&self, text: &str, ok: bool) {
        tracing::debug!(text, ok, "Status angezeigt (NoopUi)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_from_app_state() {
        assert_eq!(Page::from(va_core::AppState::Listening), Page::Listening);
        assert_eq!(Page::from(va_core::AppState::Error), Page::Error);
    }

    #[test]
    fn noop_ui_nimmt_alle_aufrufe_entgegen() {
        let ui = NoopUi;
        ui.set_page(Page::Idle);
        ui.update_transcript("hallo", true);
        ui.clear_transcript();
        ui.update_audio_level(42);
        ui.show_error("fehler");
        ui.show_status("verbunden", true);
    }
}
