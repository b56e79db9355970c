use thiserror::Error;

use crate::model::ids::{CourseId, ModuleId};
use crate::model::language::{Language, Localized};

/// Points awarded for a correct quiz answer unless a quiz says otherwise.
pub const DEFAULT_QUIZ_POINTS: u32 = 50;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no quiz for course {course} module {module}")]
    NotFound { course: CourseId, module: ModuleId },

    #[error("option {choice} is out of range (quiz has {options} options)")]
    InvalidChoice { choice: usize, options: usize },
}

/// Multiple-choice question attached to a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    pub course_id: CourseId,
    pub module_id: ModuleId,
    pub question: Localized<String>,
    pub options: Vec<Localized<String>>,
    pub correct_option: usize,
    pub points: u32,
}

/// A quiz rendered in one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedQuiz {
    pub language: Language,
    pub question: String,
    pub options: Vec<String>,
}

impl Quiz {
    #[must_use]
    pub fn localize(&self, language: Language) -> LocalizedQuiz {
        LocalizedQuiz {
            language,
            question: self.question.get(language).clone(),
            options: self
                .options
                .iter()
                .map(|option| option.get(language).clone())
                .collect(),
        }
    }

    /// # Errors
    ///
    /// Returns `QuizError::InvalidChoice` if `choice` is not an option index.
    pub fn check(&self, choice: usize) -> Result<bool, QuizError> {
        if choice >= self.options.len() {
            return Err(QuizError::InvalidChoice {
                choice,
                options: self.options.len(),
            });
        }
        Ok(choice == self.correct_option)
    }
}

/// Quizzes keyed by course and module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizBank {
    quizzes: Vec<Quiz>,
}

impl QuizBank {
    #[must_use]
    pub fn new(quizzes: Vec<Quiz>) -> Self {
        Self { quizzes }
    }

    /// # Errors
    ///
    /// Returns `QuizError::NotFound` if the module has no quiz.
    pub fn quiz(&self, course: &CourseId, module: ModuleId) -> Result<&Quiz, QuizError> {
        self.quizzes
            .iter()
            .find(|quiz| &quiz.course_id == course && quiz.module_id == module)
            .ok_or_else(|| QuizError::NotFound {
                course: course.clone(),
                module,
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }

    /// Quizzes shipped with the digital marketing course.
    #[must_use]
    pub fn builtin() -> Self {
        let course = CourseId::from_static("digital-marketing");
        let quiz = |module: u32,
                    question: Localized<&'static str>,
                    options: Vec<Localized<&'static str>>,
                    correct_option: usize| Quiz {
            course_id: course.clone(),
            module_id: ModuleId::from_static(module),
            question: owned(question),
            options: options.into_iter().map(owned).collect(),
            correct_option,
            points: DEFAULT_QUIZ_POINTS,
        };

        Self::new(vec![
            quiz(
                1,
                loc(
                    "Wetin be digital marketing?",
                    "Kí ni digital marketing?",
                    "Menene tallan dijital?",
                    "Gịnị bụ ahịa dijitalụ?",
                    "What is digital marketing?",
                ),
                vec![
                    loc(
                        "To advertise product and service for internet",
                        "Ìpolówó ọjà àti iṣẹ́ lórí ayélujára",
                        "Tallata kayayyaki da ayyuka a intanet",
                        "Ịkwalite ngwaahịa na ọrụ n'ịntanetị",
                        "Promoting products and services online",
                    ),
                    loc(
                        "To sell market only for market square",
                        "Títa ọjà ní ọjà nìkan",
                        "Sayar da kaya a kasuwa kawai",
                        "Ire ahịa naanị n'ahịa",
                        "Selling goods only in the market square",
                    ),
                    loc(
                        "To print flyer with hand",
                        "Títẹ̀ ìwé ìpolówó pẹ̀lú ọwọ́",
                        "Buga takardun talla da hannu",
                        "Ibipụta akwụkwọ mgbasa ozi n'aka",
                        "Printing flyers by hand",
                    ),
                ],
                0,
            ),
            quiz(
                2,
                loc(
                    "Which platform better pass for short video?",
                    "Èwo ni ó dára jù fún fídíò kúkúrú?",
                    "Wane dandali ne ya fi dacewa da gajerun bidiyo?",
                    "Kedu ikpo okwu kacha mma maka obere vidiyo?",
                    "Which platform is best for short video content?",
                ),
                vec![
                    loc(
                        "Email newsletter",
                        "Lẹ́tà ímeèlì",
                        "Wasiƙar imel",
                        "Akwụkwọ ozi email",
                        "Email newsletter",
                    ),
                    same("TikTok"),
                    loc(
                        "Billboard",
                        "Pátákó ìpolówó",
                        "Allon talla",
                        "Bọọdụ mgbasa ozi",
                        "Billboard",
                    ),
                ],
                1,
            ),
            quiz(
                3,
                loc(
                    "Wetin dey make social media post good?",
                    "Kí ló ń mú ìfiránṣẹ́ orí ayélujára dára?",
                    "Me ke sa rubutu a kafofin sada zumunta ya yi kyau?",
                    "Gịnị na-eme ka ozi na soshal midia dị mma?",
                    "What makes a good social media post?",
                ),
                vec![
                    loc(
                        "Plenty hashtag anyhow",
                        "Ọ̀pọ̀lọpọ̀ hashtag láìnídìí",
                        "Hashtag da yawa ba tare da dalili ba",
                        "Ọtụtụ hashtag n'enweghị ihe kpatara ya",
                        "As many hashtags as possible",
                    ),
                    loc(
                        "Just text wey no get purpose",
                        "Ọ̀rọ̀ tí kò ní ète",
                        "Rubutu marar manufa",
                        "Ederede na-enweghị ebumnuche",
                        "Text with no picture or purpose",
                    ),
                    loc(
                        "Clear message wey your audience go understand",
                        "Ọ̀rọ̀ tó ṣe kedere fún àwọn olùgbọ́ rẹ",
                        "Saƙo bayyananne ga masu sauraronka",
                        "Ozi doro anya maka ndị na-ege gị ntị",
                        "A clear message for your audience",
                    ),
                ],
                2,
            ),
            quiz(
                4,
                loc(
                    "Which number dey show how many people click your advert?",
                    "Nọ́mbà wo ló ń fi iye ènìyàn tó tẹ ìpolówó rẹ hàn?",
                    "Wane lamba ne ke nuna adadin mutanen da suka danna tallanka?",
                    "Kedu ọnụọgụ na-egosi ole mmadụ pịrị mgbasa ozi gị?",
                    "Which number shows how many people clicked your ad?",
                ),
                vec![
                    same("Click-through rate"),
                    loc(
                        "Follower birthday",
                        "Ọjọ́ìbí olùtẹ̀lé",
                        "Ranar haihuwar mabiyi",
                        "Ụbọchị ọmụmụ onye na-eso",
                        "Follower birthday",
                    ),
                    loc(
                        "Font size",
                        "Ìwọ̀n lẹ́tà",
                        "Girman rubutu",
                        "Nha mkpụrụ akwụkwọ",
                        "Font size",
                    ),
                ],
                0,
            ),
        ])
    }
}

fn loc<'a>(
    pidgin: &'a str,
    yoruba: &'a str,
    hausa: &'a str,
    igbo: &'a str,
    english: &'a str,
) -> Localized<&'a str> {
    Localized {
        pidgin,
        yoruba,
        hausa,
        igbo,
        english,
    }
}

fn same(text: &str) -> Localized<&str> {
    loc(text, text, text, text, text)
}

fn owned(text: Localized<&str>) -> Localized<String> {
    text.map(str::to_string)
}
