//! Keyword classifiers for platform inference and action routing.
//!
//! All trigger phrases live in the tables below so behavior can be pinned by
//! tests. Every classifier is a pure function over the lowercased message.
//!
//! ```text
//! message ──► infer_platform ──► PlatformGuess   (first message, no BuildSpec)
//! answer  ──► parse_platform_answer ──► PlatformGuess   (after clarification)
//! message ──► classify_action ──► Image > Build > Chat
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use devassist_store::Platform;

/// Question emitted once when a project's platform cannot be inferred.
pub const CLARIFICATION_QUESTION: &str =
    "Is this a web app, an iPhone app, an Android app, or both?";

/// Web markers used for inference. "dashboard" is intentionally absent: a
/// dashboard can live on any platform.
pub const WEB_KEYWORDS: &[&str] = &["web", "website", "saas", "landing page", r"next\.?js", "browser"];

/// Apple platform markers.
pub const IOS_KEYWORDS: &[&str] = &["ios", "iphone", "ipad", "apple"];

/// Android platform markers.
pub const ANDROID_KEYWORDS: &[&str] = &["android"];

/// Answers that select both mobile platforms.
pub const BOTH_ANSWER_KEYWORDS: &[&str] = &[
    "both",
    "ios and android",
    "iphone and android",
    "android and iphone",
];

/// Web markers accepted in a clarification answer.
pub const WEB_ANSWER_KEYWORDS: &[&str] = &["web", "website", "browser", "saas"];

/// Substrings that request a visual mockup.
pub const IMAGE_PHRASES: &[&str] = &[
    "mockup",
    "wireframe",
    "ui design",
    "ui mockup",
    "design image",
    "screen design",
    "dashboard ui",
    "create a ui",
    "ui image",
    "mock up",
];

/// Substrings that explicitly request code generation.
pub const BUILD_PHRASES: &[&str] = &[
    "build",
    "create an app",
    "create a project",
    "generate code",
    "write code",
    "set up",
    "implement",
    "update the app",
    "modify the app",
    "change the app",
];

/// Everyday phrasing that still means "make something".
pub const BUILDER_PHRASES: &[&str] = &["create a", "add a", "make this", "app that"];

/// Platform or stack mentions that, together with requirements, imply a build.
pub const STACK_KEYWORDS: &[&str] = &[
    "ios",
    "android",
    "iphone",
    "ipad",
    r"react\s*native",
    "expo",
    r"next\.?js",
    "web app",
    "saas",
];

/// Requirement words counted as evidence of an app description.
pub const REQUIREMENT_KEYWORDS: &[&str] =
    &["use", "support", "include", "should", "must", "need", "with", "add"];

/// Requirement hits needed alongside a stack mention.
pub const MIN_REQUIREMENT_HITS: usize = 2;

/// File, endpoint and credential names that signal concrete code work.
pub const CODE_SIGNAL_KEYWORDS: &[&str] = &[
    "readme",
    r"package\.json",
    r"app\.js",
    r"index\.html",
    "src/",
    r"\.env",
    "endpoint",
    "api key",
];

/// Alternation of `words`, each anchored by `\b` only on a side that starts
/// or ends with a word character, so `.env` and `src/` still match.
fn word_set(words: &[&str]) -> Regex {
    let alternatives: Vec<String> = words
        .iter()
        .map(|word| {
            let starts_word = word.chars().next().is_some_and(char::is_alphanumeric);
            let ends_word = word.chars().last().is_some_and(char::is_alphanumeric);
            format!(
                "{}{}{}",
                if starts_word { r"\b" } else { "" },
                word,
                if ends_word { r"\b" } else { "" }
            )
        })
        .collect();
    Regex::new(&format!("(?:{})", alternatives.join("|"))).expect("keyword table must compile")
}

static WEB_RE: Lazy<Regex> = Lazy::new(|| word_set(WEB_KEYWORDS));
static IOS_RE: Lazy<Regex> = Lazy::new(|| word_set(IOS_KEYWORDS));
static ANDROID_RE: Lazy<Regex> = Lazy::new(|| word_set(ANDROID_KEYWORDS));
static BOTH_ANSWER_RE: Lazy<Regex> = Lazy::new(|| word_set(BOTH_ANSWER_KEYWORDS));
static WEB_ANSWER_RE: Lazy<Regex> = Lazy::new(|| word_set(WEB_ANSWER_KEYWORDS));
static STACK_RE: Lazy<Regex> = Lazy::new(|| word_set(STACK_KEYWORDS));
static REQUIREMENT_RE: Lazy<Regex> = Lazy::new(|| word_set(REQUIREMENT_KEYWORDS));
static CODE_SIGNAL_RE: Lazy<Regex> = Lazy::new(|| word_set(CODE_SIGNAL_KEYWORDS));
static SELF_DESCRIBED_APP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(it is|it's)\s+(an?\s+)?app\b").expect("app description regex must compile")
});

/// Result of platform inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformGuess {
    Web,
    Ios,
    Android,
    Both,
    Unresolved,
}

impl PlatformGuess {
    /// The concrete platform, if one was recognized.
    pub fn platform(&self) -> Option<Platform> {
        match self {
            Self::Web => Some(Platform::Web),
            Self::Ios => Some(Platform::Ios),
            Self::Android => Some(Platform::Android),
            Self::Both => Some(Platform::IosAndroid),
            Self::Unresolved => None,
        }
    }

    /// Resolved platform, falling back to web.
    pub fn or_web(&self) -> Platform {
        self.platform().unwrap_or(Platform::Web)
    }
}

/// What a message asks the system to do once the platform is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Image,
    Build,
    Chat,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Build => "build",
            Self::Chat => "chat",
        }
    }
}

/// Infer a platform from a first message. Mobile markers win over web.
pub fn infer_platform(message: &str) -> PlatformGuess {
    let text = message.to_lowercase();
    let ios = IOS_RE.is_match(&text);
    let android = ANDROID_RE.is_match(&text);

    match (ios, android) {
        (true, true) => PlatformGuess::Both,
        (true, false) => PlatformGuess::Ios,
        (false, true) => PlatformGuess::Android,
        (false, false) if WEB_RE.is_match(&text) => PlatformGuess::Web,
        _ => PlatformGuess::Unresolved,
    }
}

/// Parse the answer to the clarification question. Narrower than
/// [`infer_platform`]: "both" resolves to both mobile platforms.
pub fn parse_platform_answer(answer: &str) -> PlatformGuess {
    let text = answer.to_lowercase();

    if BOTH_ANSWER_RE.is_match(&text) {
        PlatformGuess::Both
    } else if WEB_ANSWER_RE.is_match(&text) {
        PlatformGuess::Web
    } else if IOS_RE.is_match(&text) {
        PlatformGuess::Ios
    } else if ANDROID_RE.is_match(&text) {
        PlatformGuess::Android
    } else {
        PlatformGuess::Unresolved
    }
}

/// Route a message. Image requests take priority over builds, builds over chat.
pub fn classify_action(message: &str) -> Action {
    let text = message.to_lowercase();

    if is_image_request(&text) {
        Action::Image
    } else if is_build_request(&text) {
        Action::Build
    } else {
        Action::Chat
    }
}

fn is_image_request(text: &str) -> bool {
    IMAGE_PHRASES.iter().any(|phrase| text.contains(phrase))
}

fn is_build_request(text: &str) -> bool {
    if BUILD_PHRASES.iter().any(|phrase| text.contains(phrase)) {
        return true;
    }
    if BUILDER_PHRASES.iter().any(|phrase| text.contains(phrase)) {
        return true;
    }

    let mentions_stack = SELF_DESCRIBED_APP_RE.is_match(text) || STACK_RE.is_match(text);
    let requirement_hits = REQUIREMENT_RE.find_iter(text).count();
    if mentions_stack && requirement_hits >= MIN_REQUIREMENT_HITS {
        return true;
    }

    CODE_SIGNAL_RE.is_match(text)
}
