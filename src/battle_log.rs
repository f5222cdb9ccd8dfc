use serde::Serialize;
use serde_json::json;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Ready,
    Cooldown,
    Locked,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SideSnapshot {
    pub hp: u32,
    pub energy: u32,
    pub shields: u8,
    pub phase: Phase,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    FastMove {
        side: usize,
        move_id: String,
        damage: u32,
        energy: u32,
    },
    ChargedMove {
        side: usize,
        move_id: String,
        damage: u32,
        shielded: bool,
    },
    StatChange {
        side: usize,
        attack: i8,
        defense: i8,
    },
    Faint {
        side: usize,
    },
    Timeout,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnEntry {
    pub turn: u32,
    pub events: Vec<LogEvent>,
    pub sides: [SideSnapshot; 2],
}

/// Ordered turn log recorded in debug mode. Informational only.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TurnLog {
    labels: [String; 2],
    turns: Vec<TurnEntry>,
    #[serde(skip)]
    pending: Vec<LogEvent>,
}

impl TurnLog {
    pub fn new(label_a: impl Into<String>, label_b: impl Into<String>) -> Self {
        Self {
            labels: [label_a.into(), label_b.into()],
            turns: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn push(&mut self, event: LogEvent) {
        self.pending.push(event);
    }

    pub fn end_turn(&mut self, turn: u32, sides: [SideSnapshot; 2]) {
        let events = std::mem::take(&mut self.pending);
        self.turns.push(TurnEntry {
            turn,
            events,
            sides,
        });
    }

    pub fn turns(&self) -> &[TurnEntry] {
        &self.turns
    }

    pub fn events(&self) -> impl Iterator<Item = (u32, &LogEvent)> {
        self.turns
            .iter()
            .flat_map(|t| t.events.iter().map(move |e| (t.turn, e)))
    }

    /// Text rendering, one line per event.
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for entry in &self.turns {
            if entry.events.is_empty() {
                continue;
            }
            out.push(format!("|turn|{}", entry.turn));
            for event in &entry.events {
                out.push(self.render(event));
            }
        }
        out
    }

    fn render(&self, event: &LogEvent) -> String {
        match event {
            LogEvent::FastMove {
                side,
                move_id,
                damage,
                energy,
            } => format!("|fast|{}|{move_id}|{damage}|+{energy}", self.labels[*side]),
            LogEvent::ChargedMove {
                side,
                move_id,
                damage,
                shielded,
            } => {
                let suffix = if *shielded { "|shielded" } else { "" };
                format!("|charged|{}|{move_id}|{damage}{suffix}", self.labels[*side])
            }
            LogEvent::StatChange {
                side,
                attack,
                defense,
            } => format!("|-stages|{}|atk {attack:+}|def {defense:+}", self.labels[*side]),
            LogEvent::Faint { side } => format!("|faint|{}", self.labels[*side]),
            LogEvent::Timeout => "|timeout|".to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "combatants": self.labels,
            "turns": self.turns,
        })
    }
}
