//! 응답 조립 - 의도별 템플릿 + 구조화된 섹션 빌더
//!
//! 템플릿은 `Section` 목록만 만들고, 텍스트 직렬화는 `ResponseDraft::render`
//! 한 곳에서 합니다. 최종 신뢰도와 출처는 `finalize`에서 붙습니다.

use serde::Serialize;

use crate::error::{AssistantError, AssistantResult};
use crate::knowledge::{query_tokens, SearchResult};

use super::intent::{Intent, IntentKind};
use super::legal;

pub const GREETING_MESSAGE: &str = "Hello! I'm here to help you with California DMV services. You can ask me about driver's license renewal, REAL ID, vehicle registration, DMV appointments, fees, and office locations. What can I help you with today?";

pub const OFF_TOPIC_MESSAGE: &str = "Thank you for asking! I'm specifically designed to help with California DMV services. Please feel free to ask me about driver's licenses, vehicle registration, REAL ID, appointments, fees, or DMV office locations. How can I assist you with DMV-related questions?";

pub const NO_RESULTS_MESSAGE: &str = "I couldn't find specific information about that in the DMV documents. Could you please rephrase your question or ask about something more specific related to California DMV services?";

pub const APOLOGY_MESSAGE: &str =
    "I'm experiencing some technical difficulties. Please try asking your question again.";

/// 실패/빈 결과 응답 신뢰도
pub const LOW_CONFIDENCE: f32 = 0.1;

// ============================================================================
// Response
// ============================================================================

/// 최종 응답
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub message: String,
    /// [0, 1]
    pub confidence: f32,
    /// 검색된 문서 URL (순위 순, 중복 제거 없음)
    pub sources: Vec<String>,
}

impl Response {
    fn canned(message: &str, confidence: f32) -> Self {
        Self {
            message: message.to_string(),
            confidence,
            sources: Vec::new(),
        }
    }

    pub fn greeting() -> Self {
        Self::canned(GREETING_MESSAGE, 1.0)
    }

    pub fn off_topic() -> Self {
        Self::canned(OFF_TOPIC_MESSAGE, 1.0)
    }

    pub fn no_results() -> Self {
        Self::canned(NO_RESULTS_MESSAGE, LOW_CONFIDENCE)
    }

    pub fn apology() -> Self {
        Self::canned(APOLOGY_MESSAGE, LOW_CONFIDENCE)
    }
}

// ============================================================================
// Sections
// ============================================================================

/// 응답 섹션
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Heading(String),
    Paragraph(String),
    Bullets { title: String, items: Vec<String> },
    Numbered { title: String, items: Vec<String> },
    /// 공식 페이지 URL
    Citation(String),
}

impl Section {
    fn title(&self) -> Option<&str> {
        match self {
            Section::Heading(text) => Some(text),
            Section::Bullets { title, .. } | Section::Numbered { title, .. } => Some(title),
            Section::Paragraph(_) | Section::Citation(_) => None,
        }
    }

    fn render(&self) -> String {
        match self {
            Section::Heading(text) | Section::Paragraph(text) => text.clone(),
            Section::Bullets { title, items } => {
                let mut out = format!("{}:", title);
                for item in items {
                    out.push_str("\n• ");
                    out.push_str(item);
                }
                out
            }
            Section::Numbered { title, items } => {
                let mut out = format!("{}:", title);
                for (i, item) in items.iter().enumerate() {
                    out.push_str(&format!("\n{}. {}", i + 1, item));
                }
                out
            }
            Section::Citation(url) => format!("Visit the official DMV page: {}", url),
        }
    }
}

/// 렌더링 전 응답 초안
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDraft {
    intent: IntentKind,
    base_confidence: f32,
    sections: Vec<Section>,
}

impl ResponseDraft {
    pub fn new(intent: IntentKind, base_confidence: f32) -> Self {
        Self {
            intent,
            base_confidence,
            sections: Vec::new(),
        }
    }

    pub fn heading(&mut self, text: impl Into<String>) -> &mut Self {
        self.sections.push(Section::Heading(text.into()));
        self
    }

    pub fn paragraph(&mut self, text: impl Into<String>) -> &mut Self {
        self.sections.push(Section::Paragraph(text.into()));
        self
    }

    pub fn bullets<S: AsRef<str>>(&mut self, title: &str, items: &[S]) -> &mut Self {
        self.sections.push(Section::Bullets {
            title: title.to_string(),
            items: items.iter().map(|s| s.as_ref().to_string()).collect(),
        });
        self
    }

    pub fn numbered<S: AsRef<str>>(&mut self, title: &str, items: &[S]) -> &mut Self {
        self.sections.push(Section::Numbered {
            title: title.to_string(),
            items: items.iter().map(|s| s.as_ref().to_string()).collect(),
        });
        self
    }

    pub fn citation(&mut self, url: impl Into<String>) -> &mut Self {
        self.sections.push(Section::Citation(url.into()));
        self
    }

    pub fn intent(&self) -> IntentKind {
        self.intent
    }

    pub fn base_confidence(&self) -> f32 {
        self.base_confidence
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// 제목이 `title`인 섹션이 있는지
    pub fn has_section(&self, title: &str) -> bool {
        self.sections.iter().any(|s| s.title() == Some(title))
    }

    /// 텍스트로 직렬화 (섹션 사이 빈 줄)
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(Section::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// 템플릿 입력
struct TemplateContext<'a> {
    intent: &'a Intent,
    /// 소문자 질의
    query: String,
    /// 검색된 청크 본문 (소문자, 공백 연결)
    content: String,
    docs: &'a [SearchResult],
}

impl TemplateContext<'_> {
    fn facet(&self, facet: &str) -> bool {
        self.intent.has_facet(facet)
    }

    fn query_has(&self, needle: &str) -> bool {
        self.query.contains(needle)
    }

    fn content_has(&self, needle: &str) -> bool {
        self.content.contains(needle)
    }
}

/// 의도와 검색 결과로 초안 생성 (인용 줄 미포함)
pub fn draft_response(
    intent: &Intent,
    query: &str,
    docs: &[SearchResult],
) -> AssistantResult<ResponseDraft> {
    if docs.is_empty() {
        return Err(AssistantError::ResponseGeneration(
            "no retrieved documents to answer from".to_string(),
        ));
    }

    let ctx = TemplateContext {
        intent,
        query: query.trim().to_lowercase(),
        content: docs
            .iter()
            .map(|d| d.chunk.text.to_lowercase())
            .collect::<Vec<_>>()
            .join(" "),
        docs,
    };

    let draft = match intent.kind {
        IntentKind::DmvServices => dmv_services(&ctx),
        IntentKind::LicenseRenewal => license_renewal(&ctx),
        IntentKind::RealId => real_id(&ctx),
        IntentKind::Appointment => appointment(&ctx),
        IntentKind::VehicleRegistration => vehicle_registration(&ctx),
        IntentKind::Fees => fees(&ctx),
        IntentKind::OfficeLocations => office_locations(&ctx),
        IntentKind::LegalProcedures => legal_procedures(&ctx),
        IntentKind::Eligibility => eligibility(&ctx),
        IntentKind::DocumentsRequired => documents_required(&ctx),
        IntentKind::ProcessSteps => process_steps(&ctx),
        IntentKind::General => general(&ctx),
        IntentKind::Greeting | IntentKind::OffTopic => {
            return Err(AssistantError::ResponseGeneration(format!(
                "intent {} has no retrieval template",
                intent.kind
            )))
        }
    };

    Ok(draft)
}

/// 인용 줄, 최종 신뢰도, 출처를 붙여 응답 완성
pub fn finalize(mut draft: ResponseDraft, docs: &[SearchResult]) -> Response {
    if let Some(top) = docs.first() {
        draft.citation(top.chunk.url.clone());
    }

    Response {
        message: draft.render(),
        confidence: combined_confidence(draft.base_confidence(), docs),
        sources: docs.iter().map(|d| d.chunk.url.clone()).collect(),
    }
}

/// `draft_response` + `finalize`
pub fn assemble(intent: &Intent, query: &str, docs: &[SearchResult]) -> AssistantResult<Response> {
    let draft = draft_response(intent, query, docs)?;
    Ok(finalize(draft, docs))
}

/// min(base · (1 + 평균 blended), 1.0), [0, 1]로 제한
pub fn combined_confidence(base: f32, docs: &[SearchResult]) -> f32 {
    let base = base.clamp(0.0, 1.0);
    if docs.is_empty() {
        return base;
    }

    let average = docs.iter().map(|d| d.blended_score).sum::<f32>() / docs.len() as f32;
    if !average.is_finite() {
        return base;
    }

    (base * (1.0 + average)).clamp(0.0, 1.0)
}

// ============================================================================
// Templates
// ============================================================================

fn dmv_services(_ctx: &TemplateContext) -> ResponseDraft {
    let mut d = ResponseDraft::new(IntentKind::DmvServices, 0.95);
    d.heading("California DMV Services")
        .bullets(
            "Driver Services",
            &[
                "Driver license applications and renewals",
                "REAL ID applications and renewals",
                "Driving tests and permit applications",
                "Address changes and duplicate licenses",
            ],
        )
        .bullets(
            "Vehicle Services",
            &[
                "Vehicle registration and renewal",
                "Title transfers and duplicates",
                "Smog check information",
                "Disabled parking placards",
            ],
        )
        .bullets(
            "Online Services",
            &[
                "License and vehicle registration renewals",
                "Fee calculations and payments",
                "Appointment scheduling",
                "Address changes",
            ],
        )
        .bullets(
            "Office Services",
            &[
                "In-person transactions",
                "Documentation verification",
                "Testing services",
                "Special needs assistance",
            ],
        )
        .paragraph("For specific information about any service, visit the official DMV website at dmv.ca.gov");
    d
}

fn license_renewal(ctx: &TemplateContext) -> ResponseDraft {
    let mut d = ResponseDraft::new(IntentKind::LicenseRenewal, 0.9);
    d.heading("California Driver's License Renewal");

    if ctx.facet("online") || ctx.content_has("online") {
        d.bullets(
            "Online Renewal",
            &[
                "Available if you are eligible and your license has not been expired for more than 12 months",
                "Need your license number and last 4 digits of SSN",
                "Available 24/7 with immediate confirmation",
            ],
        );
    }

    if ctx.facet("mail") || ctx.content_has("mail") {
        d.bullets(
            "Mail Renewal",
            &[
                "Available for eligible applicants who receive a renewal notice",
                "Allow 2-3 weeks for processing",
            ],
        );
    }

    if ctx.facet("in_person") || ctx.content_has("office") || ctx.content_has("person") {
        d.bullets(
            "In-Person Renewal",
            &[
                "Visit any DMV office with proper identification",
                "Appointment recommended for faster service",
                "Required if you need to update photo or information",
            ],
        );
    }

    if ctx.facet("eligibility") || ctx.query_has("eligib") {
        d.bullets(
            "Eligibility Requirements",
            &[
                "License must not be expired for more than 12 months for online renewal",
                "No address changes or other updates needed",
            ],
        );
    }

    d.bullets(
        "Fees and Processing",
        &[
            "Standard license renewal: $39",
            "Senior/disabled veterans may qualify for reductions",
            "New license mailed within 2-3 weeks",
        ],
    )
    .paragraph("Pro Tip: Check your renewal eligibility online first to save time!");
    d
}

fn real_id(ctx: &TemplateContext) -> ResponseDraft {
    let mut d = ResponseDraft::new(IntentKind::RealId, 0.9);
    d.heading("California REAL ID Information").paragraph(
        "What is REAL ID? A federally compliant ID required for domestic flights and federal facilities starting May 7, 2025.",
    );

    if ctx.facet("documents") || ctx.query_has("bring") {
        d.bullets(
            "Required Documents",
            &[
                "Identity: Valid passport, certified birth certificate, or permanent resident card",
                "California Residency: Utility bill, lease agreement, or bank statement (last 90 days)",
                "Social Security: SSN card or W-2 form",
                "Important: Must bring ORIGINAL or CERTIFIED documents (no copies)",
            ],
        );
    }

    if ctx.facet("appointment") {
        d.bullets(
            "Appointment Requirements",
            &[
                "REAL ID requires an in-person visit (cannot be done online)",
                "Appointment strongly recommended",
                "Walk-ins accepted but expect longer wait times",
            ],
        );
    }

    if ctx.facet("comparison") {
        d.bullets(
            "REAL ID vs Standard License",
            &[
                "REAL ID: Has a gold bear and star in upper right corner",
                "REAL ID: Required for domestic flights after May 2025",
                "REAL ID: Access to federal facilities",
                "Standard: Lower compliance, no federal requirements",
            ],
        );
    }

    d.bullets(
        "Cost and Processing",
        &[
            "Fee: $39 (same as standard license)",
            "Processing: 2-3 weeks (mailed to your address)",
            "Can upgrade existing license when renewing",
        ],
    )
    .paragraph("Remember: The REAL ID has a gold bear and star marking for federal compliance.");
    d
}

fn appointment(ctx: &TemplateContext) -> ResponseDraft {
    let mut d = ResponseDraft::new(IntentKind::Appointment, 0.85);
    d.heading("DMV Appointment Information").bullets(
        "Scheduling an Appointment",
        &[
            "Visit the official DMV website's appointment system",
            "Call DMV customer service: 1-800-777-0133",
            "Select your preferred office and available time slot",
        ],
    );

    if ctx.facet("cancel") || ctx.facet("reschedule") {
        d.bullets(
            "Managing Your Appointment",
            &[
                "Cancel or modify appointments online",
                "Use your confirmation number for changes",
                "Cancel at least 24 hours in advance to avoid penalties",
            ],
        );
    }

    if ctx.facet("wait_time") {
        d.bullets(
            "Wait Times",
            &[
                "Appointments typically have minimal wait",
                "Walk-ins may experience 1-3 hour waits",
                "Check current wait times on DMV website",
            ],
        );
    }

    d.paragraph("Pro Tip: Many services are available online. Check if you can complete your task without visiting!");
    d
}

fn vehicle_registration(ctx: &TemplateContext) -> ResponseDraft {
    let mut d = ResponseDraft::new(IntentKind::VehicleRegistration, 0.9);
    d.heading("Vehicle Registration in California").bullets(
        "Registration Options",
        &[
            "Online: Fastest option for eligible vehicles",
            "Mail: Send renewal notice and payment",
            "In-Person: Visit any DMV office",
        ],
    );

    if ctx.facet("smog") {
        d.bullets(
            "Smog Check Requirements",
            &[
                "Required for most vehicles 8+ years old",
                "Some vehicles are exempt (electric, hybrid, new cars)",
                "Must be completed before registration renewal",
                "Choose a certified smog station",
            ],
        );
    }

    if ctx.facet("fees") {
        d.bullets(
            "Registration Fees",
            &[
                "Base fee varies by vehicle type and value",
                "Additional local fees may apply",
                "Use DMV's fee calculator for exact amount",
            ],
        );
    }

    if ctx.facet("penalties") {
        d.bullets(
            "Late Penalties",
            &[
                "Penalty fees increase the longer you wait",
                "Register before expiration to avoid extra costs",
                "Driving with expired registration is illegal",
            ],
        );
    }

    d.paragraph("Remember: Keep your registration current to avoid penalties and legal issues!");
    d
}

fn fees(ctx: &TemplateContext) -> ResponseDraft {
    let mut d = ResponseDraft::new(IntentKind::Fees, 0.8);
    d.heading("DMV Fee Information");

    if ctx.facet("license") {
        d.bullets(
            "License/ID Fees",
            &[
                "Driver's License: $39",
                "REAL ID: $39",
                "ID Card: $33",
                "Senior/Disabled discounts available",
            ],
        );
    }

    if ctx.facet("registration") {
        d.bullets(
            "Vehicle Registration",
            &[
                "Base registration fee + vehicle license fee",
                "Varies by vehicle type, weight, and value",
                "Additional county/district fees may apply",
            ],
        );
    }

    d.bullets(
        "Fee Calculator",
        &[
            "Use DMV's online fee calculator for exact amounts",
            "Fees subject to change, verify current rates",
        ],
    )
    .paragraph("Payment Methods: Cash, check, money order, or credit/debit card (service fees may apply online)");
    d
}

fn office_locations(ctx: &TemplateContext) -> ResponseDraft {
    let mut d = ResponseDraft::new(IntentKind::OfficeLocations, 0.85);
    d.heading("Finding DMV Office Locations").bullets(
        "Locate DMV Offices",
        &[
            "Use DMV website's office locator tool",
            "Search by ZIP code, city, or address",
            "Filter by services offered at each location",
        ],
    );

    if ctx.facet("hours") {
        d.bullets(
            "Office Hours",
            &[
                "Most offices: Monday-Friday, 8 AM - 5 PM",
                "Some Saturday hours available",
                "Holiday closures, check calendar",
            ],
        );
    }

    d.bullets(
        "Choosing the Right Office",
        &[
            "Check services available at each location",
            "Some offices specialize in certain services",
            "Consider current wait times",
        ],
    )
    .paragraph("Time-Saving Tip: Complete services online when possible to avoid office visits entirely!");
    d
}

fn legal_procedures(ctx: &TemplateContext) -> ResponseDraft {
    let mut d = ResponseDraft::new(IntentKind::LegalProcedures, 0.95);
    d.heading("California DMV Legal Procedures");

    if ctx.facet("dui") {
        if let Some(dui) = legal::by_id(legal::DUI_ADMIN_PER_SE) {
            d.heading(dui.title)
                .bullets(
                    "Critical Legal Facts",
                    &[
                        "Two separate proceedings: Criminal court AND DMV administrative",
                        "DMV action is independent of criminal case outcome",
                        "You have ONLY 10 days from arrest to request DMV hearing",
                        "Missing this deadline results in automatic suspension",
                    ],
                )
                .bullets("Your Legal Rights", dui.rights)
                .bullets("Legal Consequences", dui.consequences)
                .bullets("Appeal Process", dui.appeals);
        }
    }

    if ctx.facet("suspension") {
        if let Some(appeal) = legal::by_id(legal::LICENSE_SUSPENSION_APPEAL) {
            d.heading(appeal.title)
                .numbered("Legal Steps", appeal.steps)
                .bullets("Critical Timeframes", appeal.timeframes);
        }
    }

    if ctx.facet("hearing") {
        d.bullets(
            "Administrative Hearing Legal Framework",
            &[
                "Conducted by Driver Safety Hearing Officer (not a judge)",
                "Less strict evidence standards than criminal court",
                "Preponderance of evidence standard applies",
                "You may present witnesses and cross-examine DMV witnesses",
                "Decision is binding unless appealed through court system",
            ],
        );
    }

    let resources: Vec<String> = [legal::DUI_ADMIN_PER_SE, legal::LICENSE_SUSPENSION_APPEAL]
        .iter()
        .filter_map(|id| legal::by_id(id))
        .map(|p| format!("{}: {}", p.title, p.url))
        .collect();

    d.paragraph("LEGAL DISCLAIMER: This information is for educational purposes only. For specific legal advice regarding your case, consult with a qualified attorney who specializes in DMV law.")
        .bullets("Official DMV Legal Resources", resources.as_slice());
    d
}

fn eligibility(ctx: &TemplateContext) -> ResponseDraft {
    let mut d = ResponseDraft::new(IntentKind::Eligibility, 0.75);
    d.heading("Eligibility Information");

    if ctx.query_has("license") || ctx.query_has("renew") {
        d.bullets(
            "License Renewal Eligibility",
            &[
                "License expired less than 12 months for online renewal",
                "No address or name changes needed",
                "Valid Social Security number on file",
            ],
        );
    }

    d.paragraph("For specific eligibility requirements, please check the official DMV website or contact your local office.");
    d
}

fn documents_required(_ctx: &TemplateContext) -> ResponseDraft {
    let mut d = ResponseDraft::new(IntentKind::DocumentsRequired, 0.7);
    d.heading("Required Documents")
        .bullets(
            "General Document Requirements",
            &[
                "Bring ORIGINAL or CERTIFIED copies only",
                "Photocopies are typically not accepted",
                "All documents must be current and valid",
            ],
        )
        .paragraph("Pro Tip: Check the specific document requirements for your service on the DMV website before visiting!");
    d
}

fn process_steps(_ctx: &TemplateContext) -> ResponseDraft {
    let mut d = ResponseDraft::new(IntentKind::ProcessSteps, 0.7);
    d.heading("Process Steps")
        .numbered(
            "General DMV Process",
            &[
                "Determine what service you need",
                "Check if it's available online",
                "Gather required documents",
                "Make an appointment (if visiting in person)",
                "Complete the transaction",
            ],
        )
        .paragraph("Visit the DMV website for detailed step-by-step guides for specific services.");
    d
}

fn general(ctx: &TemplateContext) -> ResponseDraft {
    let mut d = ResponseDraft::new(IntentKind::General, 0.6);
    d.heading("Based on California DMV information");

    if let Some(best) = ctx.docs.first() {
        d.paragraph(relevant_sentences(&best.chunk.text, &ctx.query, 3));
    }

    d.paragraph("For complete and up-to-date information, please visit the official DMV website.");
    d
}

/// 질의 단어를 많이 포함한 문장 상위 `limit`개 (20자 이하 문장 제외)
///
/// 점수가 같으면 원문 순서를 유지합니다. 남는 문장이 없으면 본문 전체를 돌려줍니다.
fn relevant_sentences(text: &str, query: &str, limit: usize) -> String {
    let words = query_tokens(query);

    let mut scored: Vec<(usize, &str)> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().count() > 20)
        .map(|sentence| {
            let lower = sentence.to_lowercase();
            let score = words.iter().filter(|w| lower.contains(w.as_str())).count();
            (score, sentence)
        })
        .collect();

    if scored.is_empty() {
        return text.trim().to_string();
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let picked: Vec<&str> = scored.into_iter().take(limit).map(|(_, s)| s).collect();
    format!("{}.", picked.join(". "))
}

// ============================================================================
// Tests
// ============================================================================
