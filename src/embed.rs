// embed.rs
// Host-page parameters for the embeddable widget and the placement they produce.

use crate::config::{Contracts, Widget};
use alloy_primitives::Address;
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Inline,
    Modal,
    Floating,
}

impl Mode {
    pub fn parse(s: &str) -> Mode {
        match s.trim() {
            "modal" => Mode::Modal,
            "floating" => Mode::Floating,
            _ => Mode::Inline,
        }
    }
}

/// CSS length; bare numbers are pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension(pub String);

impl Dimension {
    pub fn parse(s: &str) -> Result<Dimension> {
        let s = s.trim();
        if s.is_empty() {
            bail!("empty dimension");
        }
        if s.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Dimension(format!("{s}px")));
        }
        let digits = s.trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%');
        let unit = &s[digits.len()..];
        let numeric = !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit() || c == '.');
        if !numeric || !matches!(unit, "px" | "%" | "rem" | "em" | "vh" | "vw") {
            bail!("unsupported dimension '{s}'");
        }
        Ok(Dimension(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedConfig {
    pub token: Option<Address>,
    pub symbol: String,
    pub testnet: bool,
    pub container: Option<String>,
    pub width: Dimension,
    pub height: Dimension,
    pub theme: Theme,
    pub mode: Mode,
    pub router: Option<Address>,
    pub staking: Option<Address>,
    pub button_text: String,
    pub button_color: String,
    pub widget_host: String,
}

fn attr<'a>(attrs: &'a HashMap<String, String>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|n| attrs.get(*n).or_else(|| attrs.get(&format!("data-{n}"))))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

fn address_attr(attrs: &HashMap<String, String>, names: &[&str]) -> Result<Option<Address>> {
    attr(attrs, names)
        .map(|s| Address::from_str(s).with_context(|| format!("bad address '{s}' for {}", names[0])))
        .transpose()
}

impl EmbedConfig {
    /// Builds the widget configuration from `data-*` attributes (the `data-` prefix is optional).
    /// Missing attributes fall back to the `[widget]` defaults.
    pub fn from_attributes(attrs: &HashMap<String, String>, defaults: &Widget) -> Result<EmbedConfig> {
        let symbol = attr(attrs, &["symbol"]).unwrap_or(defaults.symbol.as_str()).to_string();
        let theme = match attr(attrs, &["theme"]).unwrap_or(defaults.theme.as_str()) {
            "dark" => Theme::Dark,
            _ => Theme::Light,
        };
        let testnet = match attr(attrs, &["testnet"]) {
            Some(v) => v == "true",
            None => defaults.testnet,
        };
        let button_text = attr(attrs, &["button-text", "buttonText"])
            .map(str::to_string)
            .or_else(|| defaults.button_text.clone())
            .unwrap_or_else(|| format!("Buy {symbol}"));

        Ok(EmbedConfig {
            token: address_attr(attrs, &["token"])?,
            testnet,
            container: attr(attrs, &["container"]).map(str::to_string).or_else(|| defaults.container.clone()),
            width: Dimension::parse(attr(attrs, &["width"]).unwrap_or(defaults.width.as_str()))?,
            height: Dimension::parse(attr(attrs, &["height"]).unwrap_or(defaults.height.as_str()))?,
            theme,
            mode: Mode::parse(attr(attrs, &["position", "mode"]).unwrap_or(defaults.mode.as_str())),
            router: address_attr(attrs, &["router"])?,
            staking: address_attr(attrs, &["staking-contract", "stakingContract"])?,
            button_text,
            button_color: attr(attrs, &["button-color", "buttonColor"]).unwrap_or(defaults.button_color.as_str()).to_string(),
            widget_host: defaults.widget_host.trim_end_matches('/').to_string(),
            symbol,
        })
    }

    /// Contract addresses the embedded widget talks to: `data-token`,
    /// `data-router` and `data-staking-contract` replace the configured ones.
    pub fn contracts(&self, base: &Contracts) -> Contracts {
        Contracts {
            token: self.token.unwrap_or(base.token),
            router: self.router.unwrap_or(base.router),
            staking: self.staking.unwrap_or(base.staking),
        }
    }

    /// `{host}/brand-widget.html?token=..&symbol=..[&testnet=true][&theme=dark]`
    pub fn widget_url(&self) -> Result<String> {
        let base = format!("{}/brand-widget.html", self.widget_host);
        let mut url = url::Url::parse(&base).with_context(|| format!("bad widget host '{}'", self.widget_host))?;
        {
            let mut q = url.query_pairs_mut();
            if let Some(token) = self.token {
                q.append_pair("token", &format!("0x{}", hex::encode(token.as_slice())));
            }
            if !self.symbol.is_empty() {
                q.append_pair("symbol", &self.symbol);
            }
            if self.testnet {
                q.append_pair("testnet", "true");
            }
            if self.theme == Theme::Dark {
                q.append_pair("theme", "dark");
            }
        }
        // No parameters leaves a bare trailing '?' otherwise.
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url.to_string())
    }

    pub fn placement(&self) -> Placement {
        let mount = match &self.container {
            Some(id) => Mount::Container(id.clone()),
            None => Mount::AfterScript,
        };
        match self.mode {
            Mode::Inline => Placement::Inline { mount },
            Mode::Modal => Placement::Modal { trigger: mount, button_text: self.button_text.clone() },
            Mode::Floating => Placement::Floating { button_text: self.button_text.clone() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mount {
    Container(String),
    AfterScript,
}

/// Where the iframe (or its trigger button) goes on the host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Iframe rendered in place.
    Inline { mount: Mount },
    /// Button at `trigger`; the iframe lives in an overlay on `<body>`.
    Modal { trigger: Mount, button_text: String },
    /// Fixed corner button opening the same overlay.
    Floating { button_text: String },
}
