// prefs.rs
// Storage key schema. Older pages wrote different key names; reads accept both
// generations, writes go to the canonical key and drop the legacy one.

use crate::storage::LocalStorage;
use anyhow::Result;
use std::sync::Arc;

pub const THEME_KEY: &str = "bonzi_theme";
pub const LEGACY_THEME_KEY: &str = "bonzi-theme";
pub const LANG_KEY: &str = "bonzi_lang";
pub const LEGACY_LANG_KEY: &str = "bonzi-lang";
pub const DEV_KEY: &str = "bonzi_cockpit_key";

pub const GATE_WALLET_KEY: &str = "token_gate_wallet";
pub const GATE_ACCESS_KEY: &str = "token_gate_access";
pub const GATE_TIMESTAMP_KEY: &str = "token_gate_timestamp";
pub const GATE_ACCESS_GRANTED: &str = "granted";

pub const DEFAULT_LANG: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(s: &str) -> Option<Theme> {
        match s.trim() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Page-level default when nothing is stored: `light`, `dark`, or `system`.
pub fn default_theme(setting: &str, prefers_dark: bool) -> Theme {
    match setting {
        "system" => if prefers_dark { Theme::Dark } else { Theme::Light },
        other => Theme::parse(other).unwrap_or(Theme::Light),
    }
}

pub struct Preferences {
    storage: Arc<dyn LocalStorage>,
}

impl Preferences {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self { storage }
    }

    fn read_migrating(&self, canonical: &str, legacy: &str) -> Result<Option<String>> {
        if let Some(v) = self.storage.get_item(canonical)? {
            return Ok(Some(v));
        }
        match self.storage.get_item(legacy)? {
            Some(v) => {
                self.storage.set_item(canonical, &v)?;
                self.storage.remove_item(legacy)?;
                Ok(Some(v))
            }
            None => Ok(None),
        }
    }

    fn write_canonical(&self, canonical: &str, legacy: &str, value: &str) -> Result<()> {
        self.storage.set_item(canonical, value)?;
        self.storage.remove_item(legacy)
    }

    pub fn stored_theme(&self) -> Result<Option<Theme>> {
        Ok(self.read_migrating(THEME_KEY, LEGACY_THEME_KEY)?.as_deref().and_then(Theme::parse))
    }

    /// Stored theme, else the page default.
    pub fn theme(&self, default_setting: &str, prefers_dark: bool) -> Result<Theme> {
        Ok(self.stored_theme()?.unwrap_or_else(|| default_theme(default_setting, prefers_dark)))
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.write_canonical(THEME_KEY, LEGACY_THEME_KEY, theme.as_str())
    }

    pub fn toggle_theme(&self, default_setting: &str, prefers_dark: bool) -> Result<Theme> {
        let next = self.theme(default_setting, prefers_dark)?.toggled();
        self.set_theme(next)?;
        Ok(next)
    }

    pub fn language(&self) -> Result<String> {
        Ok(self
            .read_migrating(LANG_KEY, LEGACY_LANG_KEY)?
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LANG.to_string()))
    }

    pub fn set_language(&self, lang: &str) -> Result<()> {
        self.write_canonical(LANG_KEY, LEGACY_LANG_KEY, lang)
    }
}
