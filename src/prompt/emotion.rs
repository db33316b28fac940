use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emotion {
    ActionFigure,
    ZenGodlike,
    Ecstatic,
    Angry,
    Surprised,
    Legendary,
    ExplodingHead,
    Crying,
    Zombie,
    GhibliMeadows,
    CapedCrusader,
}

#[derive(Debug, Error)]
#[error("Invalid emotion selected. Must be one of: {}", Emotion::all_labels().join(", "))]
pub struct UnknownEmotion(pub String);

impl Emotion {
    pub const ALL: [Emotion; 11] = [
        Emotion::ActionFigure,
        Emotion::ZenGodlike,
        Emotion::Ecstatic,
        Emotion::Angry,
        Emotion::Surprised,
        Emotion::Legendary,
        Emotion::ExplodingHead,
        Emotion::Crying,
        Emotion::Zombie,
        Emotion::GhibliMeadows,
        Emotion::CapedCrusader,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Emotion::ActionFigure => "Action Figure",
            Emotion::ZenGodlike => "Zen/Godlike",
            Emotion::Ecstatic => "Ecstatic",
            Emotion::Angry => "Angry",
            Emotion::Surprised => "Surprised",
            Emotion::Legendary => "Legendary",
            Emotion::ExplodingHead => "Exploding Head",
            Emotion::Crying => "Crying",
            Emotion::Zombie => "Zombie",
            Emotion::GhibliMeadows => "Ghibli Scene in rolling meadows",
            Emotion::CapedCrusader => "Caped Crusader",
        }
    }

    pub fn all_labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|emotion| emotion.label()).collect()
    }
}

impl FromStr for Emotion {
    type Err = UnknownEmotion;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|emotion| emotion.label() == value)
            .ok_or_else(|| UnknownEmotion(value.to_string()))
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_labels() {
        assert_eq!("Action Figure".parse::<Emotion>().ok(), Some(Emotion::ActionFigure));
        assert_eq!(
            "Ghibli Scene in rolling meadows".parse::<Emotion>().ok(),
            Some(Emotion::GhibliMeadows)
        );
        for emotion in Emotion::ALL {
            assert_eq!(emotion.label().parse::<Emotion>().ok(), Some(emotion));
        }
    }

    #[test]
    fn rejects_unknown_or_differently_cased_labels() {
        assert!("action figure".parse::<Emotion>().is_err());
        let err = "Sleepy".parse::<Emotion>().unwrap_err();
        assert!(err.to_string().contains("Zen/Godlike, Ecstatic"));
    }
}
