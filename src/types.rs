use serde::{Deserialize, Serialize};
use std::fmt;

pub const SUPER_EFFECTIVE: f64 = 1.6;
pub const NOT_VERY_EFFECTIVE: f64 = 0.625;
/// Immunities become a double resist in PvP.
pub const IMMUNE: f64 = 0.390625;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Normal,
    Fire,
    Water,
    Electric,
    Grass,
    Ice,
    Fighting,
    Poison,
    Ground,
    Flying,
    Psychic,
    Bug,
    Rock,
    Ghost,
    Dragon,
    Dark,
    Steel,
    Fairy,
}

impl Type {
    pub fn name(self) -> &'static str {
        match self {
            Type::Normal => "normal",
            Type::Fire => "fire",
            Type::Water => "water",
            Type::Electric => "electric",
            Type::Grass => "grass",
            Type::Ice => "ice",
            Type::Fighting => "fighting",
            Type::Poison => "poison",
            Type::Ground => "ground",
            Type::Flying => "flying",
            Type::Psychic => "psychic",
            Type::Bug => "bug",
            Type::Rock => "rock",
            Type::Ghost => "ghost",
            Type::Dragon => "dragon",
            Type::Dark => "dark",
            Type::Steel => "steel",
            Type::Fairy => "fairy",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Combined multiplier of `move_type` against every defending type.
pub fn type_effectiveness(move_type: Type, target_types: &[Type]) -> f64 {
    let mut multiplier = 1.0;
    for t in target_types {
        multiplier *= match single_type_step(move_type, *t) {
            1 => SUPER_EFFECTIVE,
            -1 => NOT_VERY_EFFECTIVE,
            -2 => IMMUNE,
            _ => 1.0,
        };
    }
    multiplier
}

// Steps: 1 super effective, -1 resisted, -2 immune in the main series.
fn single_type_step(attacking: Type, defending: Type) -> i8 {
    use Type::*;
    match attacking {
        Normal => match defending {
            Rock | Steel => -1,
            Ghost => -2,
            _ => 0,
        },
        Fire => match defending {
            Fire | Water | Rock | Dragon => -1,
            Grass | Ice | Bug | Steel => 1,
            _ => 0,
        },
        Water => match defending {
            Water | Grass | Dragon => -1,
            Fire | Ground | Rock => 1,
            _ => 0,
        },
        Electric => match defending {
            Electric | Grass | Dragon => -1,
            Water | Flying => 1,
            Ground => -2,
            _ => 0,
        },
        Grass => match defending {
            Fire | Grass | Poison | Flying | Bug | Dragon | Steel => -1,
            Water | Ground | Rock => 1,
            _ => 0,
        },
        Ice => match defending {
            Fire | Water | Ice | Steel => -1,
            Grass | Ground | Flying | Dragon => 1,
            _ => 0,
        },
        Fighting => match defending {
            Normal | Ice | Rock | Dark | Steel => 1,
            Poison | Flying | Psychic | Bug | Fairy => -1,
            Ghost => -2,
            _ => 0,
        },
        Poison => match defending {
            Grass | Fairy => 1,
            Poison | Ground | Rock | Ghost => -1,
            Steel => -2,
            _ => 0,
        },
        Ground => match defending {
            Fire | Electric | Poison | Rock | Steel => 1,
            Grass | Bug => -1,
            Flying => -2,
            _ => 0,
        },
        Flying => match defending {
            Grass | Fighting | Bug => 1,
            Electric | Rock | Steel => -1,
            _ => 0,
        },
        Psychic => match defending {
            Fighting | Poison => 1,
            Psychic | Steel => -1,
            Dark => -2,
            _ => 0,
        },
        Bug => match defending {
            Grass | Psychic | Dark => 1,
            Fire | Fighting | Poison | Flying | Ghost | Steel | Fairy => -1,
            _ => 0,
        },
        Rock => match defending {
            Fire | Ice | Flying | Bug => 1,
            Fighting | Ground | Steel => -1,
            _ => 0,
        },
        Ghost => match defending {
            Ghost | Psychic => 1,
            Dark => -1,
            Normal => -2,
            _ => 0,
        },
        Dragon => match defending {
            Dragon => 1,
            Steel => -1,
            Fairy => -2,
            _ => 0,
        },
        Dark => match defending {
            Psychic | Ghost => 1,
            Fighting | Dark | Fairy => -1,
            _ => 0,
        },
        Steel => match defending {
            Rock | Ice | Fairy => 1,
            Fire | Water | Electric | Steel => -1,
            _ => 0,
        },
        Fairy => match defending {
            Fighting | Dragon | Dark => 1,
            Fire | Poison | Steel => -1,
            _ => 0,
        },
    }
}
