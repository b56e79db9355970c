use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported language: {0}")]
pub struct UnknownLanguage(pub String);

/// Languages the dashboard is offered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Pidgin,
    Yoruba,
    Hausa,
    Igbo,
    #[default]
    English,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Pidgin,
        Language::Yoruba,
        Language::Hausa,
        Language::Igbo,
        Language::English,
    ];

    /// Stable lowercase code used in storage and session keys.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Language::Pidgin => "pidgin",
            Language::Yoruba => "yoruba",
            Language::Hausa => "hausa",
            Language::Igbo => "igbo",
            Language::English => "english",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Language::Pidgin => "Naija Pidgin",
            Language::Yoruba => "Yorùbá",
            Language::Hausa => "Hausa",
            Language::Igbo => "Igbo",
            Language::English => "English",
        }
    }

    /// UI strings for this language.
    #[must_use]
    pub fn messages(self) -> &'static MessageSet {
        match self {
            Language::Pidgin => &PIDGIN,
            Language::Yoruba => &YORUBA,
            Language::Hausa => &HAUSA,
            Language::Igbo => &IGBO,
            Language::English => &ENGLISH,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    /// Accepts the lowercase code or the ISO 639 tag, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pidgin" | "pcm" => Ok(Language::Pidgin),
            "yoruba" | "yo" => Ok(Language::Yoruba),
            "hausa" | "ha" => Ok(Language::Hausa),
            "igbo" | "ig" => Ok(Language::Igbo),
            "english" | "en" => Ok(Language::English),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

/// Per-language user-facing strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSet {
    pub welcome: &'static str,
    pub correct_answer: &'static str,
    pub wrong_answer: &'static str,
    pub module_completed: &'static str,
    pub course_completed: &'static str,
    pub progress_saved: &'static str,
    pub save_failed: &'static str,
    pub preview_banner: &'static str,
}

/// A value with one variant per language; every language must be filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Localized<T> {
    pub pidgin: T,
    pub yoruba: T,
    pub hausa: T,
    pub igbo: T,
    pub english: T,
}

impl<T> Localized<T> {
    #[must_use]
    pub fn get(&self, language: Language) -> &T {
        match language {
            Language::Pidgin => &self.pidgin,
            Language::Yoruba => &self.yoruba,
            Language::Hausa => &self.hausa,
            Language::Igbo => &self.igbo,
            Language::English => &self.english,
        }
    }

    #[must_use]
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Localized<U> {
        Localized {
            pidgin: f(self.pidgin),
            yoruba: f(self.yoruba),
            hausa: f(self.hausa),
            igbo: f(self.igbo),
            english: f(self.english),
        }
    }
}

static ENGLISH: MessageSet = MessageSet {
    welcome: "Welcome back! Let's keep learning.",
    correct_answer: "Correct!",
    wrong_answer: "Not quite. Try again.",
    module_completed: "You finished this module!",
    course_completed: "You finished the whole course!",
    progress_saved: "Your progress has been saved.",
    save_failed: "We couldn't save that right now. Please try again.",
    preview_banner: "You are in preview mode. Nothing will be saved.",
};

static PIDGIN: MessageSet = MessageSet {
    welcome: "Welcome back! Make we continue dey learn.",
    correct_answer: "Correct! You try well well.",
    wrong_answer: "E no correct. Try am again.",
    module_completed: "You don finish this module!",
    course_completed: "You don finish the whole course!",
    progress_saved: "We don save your progress.",
    save_failed: "We no fit save am now. Abeg try again.",
    preview_banner: "Na preview mode you dey. We no go save anything.",
};

static YORUBA: MessageSet = MessageSet {
    welcome: "Ẹ kú àbọ̀! Ẹ jẹ́ ká máa kọ́ ẹ̀kọ́ lọ.",
    correct_answer: "Ó tọ̀nà!",
    wrong_answer: "Kò tọ̀nà. Ẹ tún gbìyànjú.",
    module_completed: "Ẹ ti parí ìpín yìí!",
    course_completed: "Ẹ ti parí gbogbo ẹ̀kọ́ náà!",
    progress_saved: "A ti fi ìtẹ̀síwájú yín pamọ́.",
    save_failed: "A kò lè fi pamọ́ báyìí. Ẹ tún gbìyànjú.",
    preview_banner: "Ìpò àyẹ̀wò ni èyí. A kò ní fi nǹkan pamọ́.",
};

static HAUSA: MessageSet = MessageSet {
    welcome: "Barka da dawowa! Mu ci gaba da koyo.",
    correct_answer: "Daidai ne!",
    wrong_answer: "Ba daidai ba ne. Sake gwadawa.",
    module_completed: "Ka kammala wannan darasi!",
    course_completed: "Ka kammala dukkan kwas ɗin!",
    progress_saved: "An adana ci gabanka.",
    save_failed: "Ba a iya adanawa yanzu ba. Sake gwadawa.",
    preview_banner: "Wannan yanayin gwaji ne. Ba za a adana komai ba.",
};

static IGBO: MessageSet = MessageSet {
    welcome: "Nnọọ ọzọ! Ka anyị gaa n'ihu na-amụ ihe.",
    correct_answer: "Ọ dị mma!",
    wrong_answer: "Ọ bụghị ya. Nwaa ọzọ.",
    module_completed: "Ị mechaala ngalaba a!",
    course_completed: "Ị mechaala usoro ọmụmụ niile!",
    progress_saved: "Echekwala ọganihu gị.",
    save_failed: "Enweghị ike ichekwa ugbu a. Nwaa ọzọ.",
    preview_banner: "Nke a bụ ọnọdụ nlele. A gaghị echekwa ihe ọ bụla.",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_and_iso_tags() {
        assert_eq!("Yoruba".parse::<Language>().unwrap(), Language::Yoruba);
        assert_eq!(" pcm ".parse::<Language>().unwrap(), Language::Pidgin);
        assert_eq!("ig".parse::<Language>().unwrap(), Language::Igbo);
        assert!("french".parse::<Language>().is_err());
    }

    #[test]
    fn code_round_trips_through_from_str() {
        for language in Language::ALL {
            assert_eq!(language.code().parse::<Language>().unwrap(), language);
        }
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Language::Hausa).unwrap();
        assert_eq!(json, "\"hausa\"");
    }

    #[test]
    fn every_language_has_distinct_messages() {
        let english = Language::English.messages();
        for language in Language::ALL {
            let messages = language.messages();
            assert!(!messages.welcome.is_empty());
            if language != Language::English {
                assert_ne!(messages.welcome, english.welcome);
            }
        }
    }

    #[test]
    fn localized_get_picks_language() {
        let greeting = Localized {
            pidgin: "How far",
            yoruba: "Báwo ni",
            hausa: "Sannu",
            igbo: "Kedu",
            english: "Hello",
        };
        assert_eq!(*greeting.get(Language::Hausa), "Sannu");
        let lengths = greeting.map(str::len);
        assert_eq!(*lengths.get(Language::English), 5);
    }
}
