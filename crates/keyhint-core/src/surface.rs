use crate::layout::RenderedBlock;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Screen-relative point the popup is positioned against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Anchor {
    pub x: i32,
    pub y: i32,
}

impl Anchor {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Which side of the anchor the popup opens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    #[default]
    Above,
    Below,
}

impl FromStr for Position {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "above" => Ok(Self::Above),
            "below" => Ok(Self::Below),
            other => anyhow::bail!("unknown popup position '{}'", other),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above => f.write_str("above"),
            Self::Below => f.write_str("below"),
        }
    }
}

/// Host-provided floating panel factory.
pub trait PopupSurface: Send + Sync + 'static {
    type Handle: PopupHandle;

    fn create(&self, content: &RenderedBlock, background: &str) -> Result<Self::Handle>;
}

/// A created popup. `hide` must be safe to call on a handle that never
/// finished showing.
pub trait PopupHandle: Send + 'static {
    /// `fade_ms == 0` keeps the popup up until hidden.
    fn show(&mut self, anchor: Anchor, position: Position, fade_ms: u64) -> Result<()>;
    fn hide(&mut self);
}
