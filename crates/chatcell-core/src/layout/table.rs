//! Layout lookup table keyed by message kind and direction.

use std::collections::HashMap;
use std::sync::LazyLock;

use super::model::{Direction, EdgeInsets, LayoutConfig, MessageKind, Size};

/// Message and avatar padding for incoming cells.
const INCOMING_INSETS: EdgeInsets = EdgeInsets::new(3.0, 8.0, 1.0, 0.0);

/// Message and avatar padding for outgoing cells.
const OUTGOING_INSETS: EdgeInsets = EdgeInsets::new(3.0, 0.0, 1.0, 8.0);

/// Voice bubble padding as seen on an incoming cell.
const VOICE_BUBBLE_INCOMING: EdgeInsets = EdgeInsets::new(14.0, 20.0, 20.0, 22.0);

/// Text bubble padding as seen on an outgoing cell.
const TEXT_BUBBLE_OUTGOING: EdgeInsets = EdgeInsets::new(14.0, 16.0, 16.0, 16.0);

/// Vertical spacing around system notices.
const SYSTEM_INSETS: EdgeInsets = EdgeInsets::new(8.0, 0.0, 8.0, 0.0);

static GLOBAL: LazyLock<LayoutTable> = LazyLock::new(LayoutTable::standard);

/// Layout configuration for every `(MessageKind, Direction)` pair.
#[derive(Debug, Clone)]
pub struct LayoutTable {
    entries: HashMap<(MessageKind, Direction), LayoutConfig>,
}

impl LayoutTable {
    /// Shared table built from [`LayoutTable::standard`] on first use.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Base layout for a direction, before any per-kind overrides.
    #[must_use]
    pub fn base(direction: Direction) -> LayoutConfig {
        let insets = match direction {
            Direction::Incoming => INCOMING_INSETS,
            Direction::Outgoing => OUTGOING_INSETS,
        };
        LayoutConfig::default()
            .with_avatar_insets(insets)
            .with_message_insets(insets)
    }

    /// Build the standard table.
    #[must_use]
    pub fn standard() -> Self {
        let mut entries = HashMap::new();
        for kind in MessageKind::ALL {
            for direction in [Direction::Incoming, Direction::Outgoing] {
                entries.insert((kind, direction), Self::standard_entry(kind, direction));
            }
        }
        Self { entries }
    }

    fn standard_entry(kind: MessageKind, direction: Direction) -> LayoutConfig {
        let base = Self::base(direction);
        let orient = |incoming: EdgeInsets| match direction {
            Direction::Incoming => incoming,
            Direction::Outgoing => incoming.mirrored(),
        };

        match kind {
            MessageKind::Text => base.with_bubble_insets(match direction {
                Direction::Incoming => TEXT_BUBBLE_OUTGOING.mirrored(),
                Direction::Outgoing => TEXT_BUBBLE_OUTGOING,
            }),
            MessageKind::Voice => base.with_bubble_insets(orient(VOICE_BUBBLE_INCOMING)),
            MessageKind::Image => base,
            MessageKind::System => LayoutConfig::default()
                .with_message_insets(SYSTEM_INSETS)
                .with_avatar_size(Size::ZERO),
        }
    }

    /// Replace the layout for one pair, e.g. for a custom message kind theme.
    pub fn set(&mut self, kind: MessageKind, direction: Direction, layout: LayoutConfig) {
        self.entries.insert((kind, direction), layout);
    }

    /// Layout for a message cell.
    #[must_use]
    pub fn get(&self, kind: MessageKind, direction: Direction) -> LayoutConfig {
        self.entries
            .get(&(kind, direction))
            .copied()
            .unwrap_or_else(|| Self::base(direction))
    }
}

impl Default for LayoutTable {
    fn default() -> Self {
        Self::standard()
    }
}
