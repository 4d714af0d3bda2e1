//! 의도 분류 - 순서 있는 규칙 캐스케이드
//!
//! 규칙은 (조건, 빌더) 쌍의 목록이며 고정된 순서로 평가됩니다.
//! 첫 번째로 일치한 규칙의 의도를 반환하고 더 내려가지 않습니다.
//! 인사/오프토픽 규칙이 항상 맨 앞입니다.

use std::collections::BTreeSet;
use std::fmt;

use crate::config::ClassifierSettings;

/// 인사 문구 (단어 경계 기준)
const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "how are you",
    "how do you do",
    "what's up",
    "whats up",
    "greetings",
];

/// 하나라도 있으면 오프토픽이 아님
const DMV_KEYWORDS: &[&str] = &[
    "dmv",
    "license",
    "registration",
    "real id",
    "realid",
    "appointment",
    "vehicle",
    "driver",
    "car",
    "fee",
    "cost",
    "office",
    "renew",
    "california",
];

/// 오프토픽 신호
const OFF_TOPIC_PHRASES: &[&str] = &[
    "weather",
    "time",
    "date",
    "recipe",
    "music",
    "movie",
    "sports",
    "news",
    "politics",
    "health",
    "medicine",
    "travel",
    "shopping",
    "restaurant",
    "food",
    "programming",
    "technology",
    "job",
    "work",
];

type FacetTable = &'static [(&'static [&'static str], &'static str)];

const RENEWAL_FACETS: FacetTable = &[
    (&["online"], "online"),
    (&["mail"], "mail"),
    (&["person", "office"], "in_person"),
    (&["eligib"], "eligibility"),
    (&["expire", "expir"], "expiration"),
];

const REAL_ID_FACETS: FacetTable = &[
    (&["document", "proof"], "documents"),
    (&["appointment"], "appointment"),
    (&["difference", "vs", "versus"], "comparison"),
];

const APPOINTMENT_FACETS: FacetTable = &[
    (&["cancel"], "cancel"),
    (&["reschedule", "change"], "reschedule"),
    (&["wait", "time"], "wait_time"),
];

const VEHICLE_FACETS: FacetTable = &[
    (&["renew"], "renewal"),
    (&["smog"], "smog"),
    (&["fee", "cost"], "fees"),
    (&["late", "penalty"], "penalties"),
];

const FEE_FACETS: FacetTable = &[
    (&["license"], "license"),
    (&["registration"], "registration"),
    (&["real id"], "real_id"),
];

const OFFICE_FACETS: FacetTable = &[
    (&["near", "close"], "nearby"),
    (&["hours", "time"], "hours"),
];

const LEGAL_FACETS: FacetTable = &[
    (&["dui"], "dui"),
    (&["suspension"], "suspension"),
    (&["hearing"], "hearing"),
    (&["appeal"], "appeal"),
    (&["rights"], "rights"),
];

// ============================================================================
// Types
// ============================================================================

/// 의도 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    Greeting,
    OffTopic,
    DmvServices,
    LicenseRenewal,
    RealId,
    Appointment,
    VehicleRegistration,
    Fees,
    OfficeLocations,
    LegalProcedures,
    Eligibility,
    DocumentsRequired,
    ProcessSteps,
    General,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Greeting => "greeting",
            IntentKind::OffTopic => "off_topic",
            IntentKind::DmvServices => "dmv_services",
            IntentKind::LicenseRenewal => "license_renewal",
            IntentKind::RealId => "real_id",
            IntentKind::Appointment => "appointment",
            IntentKind::VehicleRegistration => "vehicle_registration",
            IntentKind::Fees => "fees",
            IntentKind::OfficeLocations => "office_locations",
            IntentKind::LegalProcedures => "legal_procedures",
            IntentKind::Eligibility => "eligibility",
            IntentKind::DocumentsRequired => "documents_required",
            IntentKind::ProcessSteps => "process_steps",
            IntentKind::General => "general",
        }
    }

    /// 검색 없이 고정 응답으로 끝나는 의도
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, IntentKind::Greeting | IntentKind::OffTopic)
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 분류 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub kind: IntentKind,
    /// 세부 수식어 (예: "online", "dui")
    pub facets: BTreeSet<String>,
}

impl Intent {
    pub fn new(kind: IntentKind) -> Self {
        Self {
            kind,
            facets: BTreeSet::new(),
        }
    }

    pub fn has_facet(&self, facet: &str) -> bool {
        self.facets.contains(facet)
    }
}

// ============================================================================
// Rules
// ============================================================================

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;
type Builder = fn(&str) -> Intent;

/// 분류 규칙
pub struct Rule {
    kind: IntentKind,
    predicate: Predicate,
    build: Builder,
}

impl Rule {
    fn new(
        kind: IntentKind,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
        build: Builder,
    ) -> Self {
        Self {
            kind,
            predicate: Box::new(predicate),
            build,
        }
    }

    pub fn kind(&self) -> IntentKind {
        self.kind
    }

    /// 정규화된(소문자, trim) 질의에 대해 평가
    pub fn matches(&self, query: &str) -> bool {
        (self.predicate)(query)
    }
}

// ============================================================================
// IntentClassifier
// ============================================================================

/// 규칙 캐스케이드 분류기
pub struct IntentClassifier {
    rules: Vec<Rule>,
}

impl IntentClassifier {
    pub fn new(settings: &ClassifierSettings) -> Self {
        let off_topic_length = settings.off_topic_length;

        let rules = vec![
            Rule::new(IntentKind::Greeting, is_greeting, |_| {
                Intent::new(IntentKind::Greeting)
            }),
            Rule::new(
                IntentKind::OffTopic,
                move |q| is_off_topic(q, off_topic_length),
                |_| Intent::new(IntentKind::OffTopic),
            ),
            Rule::new(
                IntentKind::DmvServices,
                |q| q.contains("dmv service") || q == "dmv services",
                |_| Intent::new(IntentKind::DmvServices),
            ),
            Rule::new(
                IntentKind::LicenseRenewal,
                |q| q.contains("renew") && contains_any(q, &["license", "id"]),
                |q| with_facets(IntentKind::LicenseRenewal, q, RENEWAL_FACETS),
            ),
            Rule::new(
                IntentKind::RealId,
                |q| contains_any(q, &["real id", "realid"]),
                |q| with_facets(IntentKind::RealId, q, REAL_ID_FACETS),
            ),
            Rule::new(
                IntentKind::Appointment,
                |q| contains_any(q, &["appointment", "schedule"]),
                |q| with_facets(IntentKind::Appointment, q, APPOINTMENT_FACETS),
            ),
            Rule::new(
                IntentKind::VehicleRegistration,
                |q| {
                    contains_any(q, &["vehicle", "car"])
                        || (q.contains("registration") && !q.contains("license"))
                },
                |q| with_facets(IntentKind::VehicleRegistration, q, VEHICLE_FACETS),
            ),
            Rule::new(
                IntentKind::Fees,
                |q| contains_any(q, &["fee", "cost", "price", "payment"]),
                |q| with_facets(IntentKind::Fees, q, FEE_FACETS),
            ),
            Rule::new(
                IntentKind::OfficeLocations,
                |q| contains_any(q, &["office", "location", "address", "hours"]),
                |q| with_facets(IntentKind::OfficeLocations, q, OFFICE_FACETS),
            ),
            Rule::new(
                IntentKind::LegalProcedures,
                |q| {
                    contains_any(
                        q,
                        &[
                            "dui",
                            "admin per se",
                            "aps",
                            "license suspension",
                            "hearing",
                            "legal procedure",
                            "appeal",
                        ],
                    )
                },
                |q| with_facets(IntentKind::LegalProcedures, q, LEGAL_FACETS),
            ),
            Rule::new(
                IntentKind::Eligibility,
                |q| contains_any(q, &["eligib", "qualif"]),
                |_| Intent::new(IntentKind::Eligibility),
            ),
            Rule::new(
                IntentKind::DocumentsRequired,
                |q| contains_any(q, &["document", "bring", "need"]),
                |_| Intent::new(IntentKind::DocumentsRequired),
            ),
            Rule::new(
                IntentKind::ProcessSteps,
                |q| contains_any(q, &["how", "step", "process"]),
                |_| Intent::new(IntentKind::ProcessSteps),
            ),
        ];

        Self { rules }
    }

    /// 질의 분류 (첫 일치 규칙, 없으면 general)
    pub fn classify(&self, query: &str) -> Intent {
        let normalized = query.trim().to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.matches(&normalized))
            .map(|rule| (rule.build)(&normalized))
            .unwrap_or_else(|| Intent::new(IntentKind::General))
    }

    /// 평가 순서대로 규칙 목록
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(&ClassifierSettings::default())
    }
}

// ============================================================================
// Predicates
// ============================================================================

fn contains_any(query: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| query.contains(n))
}

fn with_facets(kind: IntentKind, query: &str, table: FacetTable) -> Intent {
    let mut intent = Intent::new(kind);
    for (needles, facet) in table {
        if contains_any(query, needles) {
            intent.facets.insert(facet.to_string());
        }
    }
    intent
}

/// 인사 여부 (단어 경계 기준 구문 일치)
///
/// 단순 부분 문자열 검사가 아니라 단어 단위로 맞춥니다. 부분 문자열로 보면
/// "vehicle"이나 "this" 안의 "hi"까지 인사로 잡혀 DMV 질문이 인사 응답으로
/// 끝나 버립니다. 구두점은 공백으로 보므로 "hi!", "hello, dmv"는 인사입니다.
pub fn is_greeting(query: &str) -> bool {
    let words: String = query
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect();
    let padded = format!(" {} ", words.split_whitespace().collect::<Vec<_>>().join(" "));

    GREETINGS
        .iter()
        .any(|g| padded.contains(&format!(" {} ", g)))
}

/// 오프토픽 여부
///
/// DMV 키워드가 하나도 없고, 오프토픽 문구가 있거나 길이가 임계값을 넘으면 오프토픽.
pub fn is_off_topic(query: &str, length_threshold: usize) -> bool {
    if contains_any(query, DMV_KEYWORDS) {
        return false;
    }

    contains_any(query, OFF_TOPIC_PHRASES) || query.chars().count() > length_threshold
}

// ============================================================================
// Tests
// ============================================================================
