//! 시스템 검증 - 고정 질의 세트로 응답 품질 점검

use std::time::{Duration, Instant};

use super::intent::IntentKind;
use super::response::Response;
use super::Assistant;

/// 검증 케이스
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationCase {
    pub query: &'static str,
    pub expected: IntentKind,
    pub description: &'static str,
}

/// 케이스별 결과
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub case: ValidationCase,
    /// 분류기가 실제로 고른 의도
    pub classified: IntentKind,
    pub response: Response,
    pub elapsed: Duration,
    /// 응답 내용 검사 통과 여부
    pub passed: bool,
}

impl ValidationOutcome {
    /// 분류 결과가 기대 의도와 같은지
    pub fn intent_matched(&self) -> bool {
        self.classified == self.case.expected
    }
}

/// 검증 리포트
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub outcomes: Vec<ValidationOutcome>,
}

impl ValidationReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn all_passed(&self) -> bool {
        self.passed() == self.total()
    }

    /// 기대와 다른 의도로 분류된 케이스
    ///
    /// 내용 검사는 통과했더라도 다른 템플릿이 답했다는 뜻입니다.
    pub fn misclassified(&self) -> Vec<&ValidationOutcome> {
        self.outcomes.iter().filter(|o| !o.intent_matched()).collect()
    }

    /// 성공률 (%)
    pub fn success_rate(&self) -> f32 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.passed() as f32 / self.total() as f32 * 100.0
    }
}

/// 내장 검증 케이스
pub fn validation_cases() -> Vec<ValidationCase> {
    vec![
        ValidationCase {
            query: "How do I renew my driver's license online?",
            expected: IntentKind::LicenseRenewal,
            description: "Online license renewal",
        },
        ValidationCase {
            query: "What documents do I need for a REAL ID?",
            expected: IntentKind::RealId,
            description: "REAL ID documentation",
        },
        ValidationCase {
            query: "How do I schedule a DMV appointment?",
            expected: IntentKind::Appointment,
            description: "Appointment scheduling",
        },
        ValidationCase {
            query: "When do I need a smog check for my car registration?",
            expected: IntentKind::VehicleRegistration,
            description: "Vehicle registration smog requirements",
        },
        ValidationCase {
            query: "How much does it cost to renew my license?",
            expected: IntentKind::Fees,
            description: "License renewal fees",
        },
        ValidationCase {
            query: "Where is the nearest DMV office?",
            expected: IntentKind::OfficeLocations,
            description: "DMV office locations",
        },
        ValidationCase {
            query: "Hi, how are you doing today?",
            expected: IntentKind::Greeting,
            description: "Basic greeting handling",
        },
        ValidationCase {
            query: "What's the weather like?",
            expected: IntentKind::OffTopic,
            description: "Off-topic question handling",
        },
    ]
}

/// 응답이 기대 의도에 맞는 내용인지 확인
pub fn check_response(expected: IntentKind, response: &Response) -> bool {
    if response.message.chars().count() < 20 || response.confidence < 0.1 {
        return false;
    }

    let message = response.message.to_lowercase();
    let has = |needle: &str| message.contains(needle);

    match expected {
        IntentKind::LicenseRenewal => has("license") && has("renew"),
        IntentKind::RealId => has("real id") || has("realid"),
        IntentKind::Appointment => has("appointment") || has("schedule"),
        IntentKind::VehicleRegistration => has("registration") || has("vehicle"),
        IntentKind::Fees => has("fee") || has("cost") || has("$"),
        IntentKind::OfficeLocations => has("office") || has("location"),
        IntentKind::Greeting => has("hello") || has("help") || has("dmv"),
        IntentKind::OffTopic => has("dmv") && (has("thank you") || has("help")),
        _ => true,
    }
}

/// 모든 케이스를 답변시키고 결과 수집
pub async fn run_validation(assistant: &Assistant) -> ValidationReport {
    let cases = validation_cases();
    let total = cases.len();
    let mut report = ValidationReport::default();

    for (i, case) in cases.into_iter().enumerate() {
        let started = Instant::now();
        let response = assistant.answer(case.query).await;
        let elapsed = started.elapsed();

        let classified = assistant.classify(case.query).kind;
        let passed = check_response(case.expected, &response);

        if classified == case.expected {
            tracing::info!(
                "[{}/{}] {} -> {} ({}, {:.2?})",
                i + 1,
                total,
                case.description,
                classified,
                if passed { "passed" } else { "failed" },
                elapsed
            );
        } else {
            tracing::warn!(
                "[{}/{}] {} -> {} but expected {} ({}, {:.2?})",
                i + 1,
                total,
                case.description,
                classified,
                case.expected,
                if passed { "passed" } else { "failed" },
                elapsed
            );
        }

        report.outcomes.push(ValidationOutcome {
            case,
            classified,
            response,
            elapsed,
            passed,
        });
    }

    report
}
