//! 법적 절차 카탈로그 - 정적 데이터
//!
//! `legal_procedures` 응답 템플릿이 이 카탈로그에서 권리/결과/항소/단계를 가져옵니다.

/// 법적 절차
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegalProcedure {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub steps: &'static [&'static str],
    pub timeframes: &'static [&'static str],
    pub consequences: &'static [&'static str],
    pub rights: &'static [&'static str],
    pub appeals: &'static [&'static str],
    pub documentation: &'static [&'static str],
    pub fees: &'static [&'static str],
    pub url: &'static str,
}

pub const DUI_ADMIN_PER_SE: &str = "dui-admin-per-se";
pub const LICENSE_SUSPENSION_APPEAL: &str = "license-suspension-appeal";
pub const NEGLIGENT_OPERATOR: &str = "negligent-operator-procedure";

static PROCEDURES: [LegalProcedure; 3] = [
    LegalProcedure {
        id: DUI_ADMIN_PER_SE,
        title: "DUI Administrative Per Se (APS) Process",
        description: "The administrative license suspension program for DUI arrests, separate from criminal court proceedings.",
        steps: &[
            "Arrest for DUI triggers immediate license suspension notice",
            "You have 10 days from arrest to request administrative hearing",
            "If no hearing requested, suspension begins on 30th day after arrest",
            "Hearing conducted by Driver Safety Hearing Officer",
            "Decision rendered based on preponderance of evidence",
            "If suspension upheld, reinstatement requirements must be met",
        ],
        timeframes: &[
            "10 days to request hearing after arrest",
            "30 days from arrest until suspension begins (if no hearing)",
            "Hearing typically held within 45 days of request",
            "Suspension periods: 4 months (first offense), 1 year (subsequent)",
        ],
        consequences: &[
            "Immediate license suspension regardless of criminal case outcome",
            "Required completion of DUI education program",
            "Installation of ignition interlock device (if required)",
            "SR-22 insurance filing requirement",
            "Reinstatement fees and penalties",
        ],
        rights: &[
            "Right to administrative hearing within 10 days",
            "Right to attorney representation (at your expense)",
            "Right to review evidence against you",
            "Right to present evidence and testimony",
            "Right to cross-examine witnesses",
            "Right to interpreter if needed",
        ],
        appeals: &[
            "File writ of mandate in superior court within 94 days",
            "Must exhaust administrative remedies first",
            "Court reviews for legal errors, not factual disputes",
            "Stay of suspension may be available pending appeal",
        ],
        documentation: &[
            "Notice of suspension from arresting officer",
            "Copy of arrest report and chemical test results",
            "DMV hearing request form (DS-367)",
            "Evidence of completion of DUI program",
            "SR-22 insurance certificate",
            "Proof of ignition interlock installation (if required)",
        ],
        fees: &[
            "Administrative hearing fee: $125",
            "Reissue fee: $125",
            "DUI program costs: $500-$1,800",
            "Ignition interlock device: $2.50-$3.50 per day",
            "SR-22 filing fee: varies by insurance company",
        ],
        url: "https://www.dmv.ca.gov/portal/driver-education-and-safety/dmv-safety-guidelines-actions/driving-under-the-influence/",
    },
    LegalProcedure {
        id: LICENSE_SUSPENSION_APPEAL,
        title: "Driver License Suspension Appeal Process",
        description: "Legal procedures for challenging DMV actions against your driving privileges.",
        steps: &[
            "Receive notice of DMV action against license",
            "Request administrative hearing within specified timeframe",
            "Prepare evidence and witnesses for hearing",
            "Attend hearing before Driver Safety Officer",
            "Receive written decision from hearing officer",
            "If unsuccessful, may file writ of mandate in court",
        ],
        timeframes: &[
            "10 days to request hearing for most actions",
            "15 days for some commercial license actions",
            "Hearings typically scheduled within 45 days",
            "94 days to file court appeal after final DMV decision",
        ],
        consequences: &[
            "Automatic suspension if no hearing requested",
            "Continued suspension if hearing unsuccessful",
            "Points may remain on driving record",
            "Increased insurance premiums",
            "Potential impact on employment",
        ],
        rights: &[
            "Right to administrative hearing",
            "Right to legal representation",
            "Right to review DMV evidence",
            "Right to present defense evidence",
            "Right to cross-examine DMV witnesses",
            "Right to court appeal of final decision",
        ],
        appeals: &[
            "File writ of mandate in superior court",
            "Must be filed within 94 days of final DMV decision",
            "Court reviews for procedural errors and legal issues",
            "May request stay of suspension pending appeal",
        ],
        documentation: &[
            "Original notice of DMV action",
            "Request for hearing form",
            "Evidence supporting your case",
            "Witness statements or testimony",
            "Driving record and history",
            "Court filing documents for appeals",
        ],
        fees: &[
            "Hearing request fee: varies by action type",
            "Attorney fees (if represented)",
            "Court filing fees for appeals: $435-$450",
            "Reinstatement fees if suspension upheld",
        ],
        url: "https://www.dmv.ca.gov/portal/driver-education-and-safety/dmv-safety-guidelines-actions/administrative-hearings/",
    },
    LegalProcedure {
        id: NEGLIGENT_OPERATOR,
        title: "Negligent Operator Treatment System (NOTS)",
        description: "Legal procedures for drivers who accumulate excessive violation points.",
        steps: &[
            "DMV monitors point accumulation on driving record",
            "Warning letter sent when approaching point threshold",
            "Order of probation issued if threshold exceeded",
            "Hearing may be required for license suspension",
            "Probationary period with restrictions imposed",
            "License suspension if violations continue",
        ],
        timeframes: &[
            "Point thresholds: 4 points in 12 months, 6 in 24 months, 8 in 36 months",
            "Probation typically lasts 12 months",
            "Hearing scheduled within 45 days of request",
        ],
        consequences: &[
            "License suspension (30 days to 6 months)",
            "Probationary restrictions on driving",
            "Required traffic violator school attendance",
            "Increased insurance premiums",
            "Impact on commercial driving privileges",
        ],
        rights: &[
            "Right to administrative hearing",
            "Right to challenge point assessments",
            "Right to present mitigating evidence",
            "Right to legal representation",
            "Right to review driving record for accuracy",
        ],
        appeals: &[
            "Request hearing to challenge NOTS action",
            "Present evidence of safe driving efforts",
            "Show completion of traffic school or defensive driving",
            "Appeal final decision through writ of mandate",
        ],
        documentation: &[
            "Complete driving record printout",
            "Traffic violation citations and court records",
            "Proof of traffic school completion",
            "Evidence of financial responsibility",
            "Medical reports if applicable",
        ],
        fees: &[
            "Hearing fee: $125",
            "Reissue fee after suspension: $125",
            "Traffic violator school: $50-$100",
            "Court costs for violations",
        ],
        url: "https://www.dmv.ca.gov/portal/driver-education-and-safety/dmv-safety-guidelines-actions/",
    },
];

/// 전체 절차
pub fn all() -> &'static [LegalProcedure] {
    &PROCEDURES
}

/// ID로 조회
pub fn by_id(id: &str) -> Option<&'static LegalProcedure> {
    PROCEDURES.iter().find(|p| p.id == id)
}

/// 대소문자 무시 검색 (제목, 설명, 단계, 권리)
pub fn search(term: &str) -> Vec<&'static LegalProcedure> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return Vec::new();
    }

    let hit = |text: &str| text.to_lowercase().contains(&term);

    PROCEDURES
        .iter()
        .filter(|p| {
            hit(p.title)
                || hit(p.description)
                || p.steps.iter().any(|s| hit(s))
                || p.rights.iter().any(|r| hit(r))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog() {
        let ids: Vec<&str> = all().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![DUI_ADMIN_PER_SE, LICENSE_SUSPENSION_APPEAL, NEGLIGENT_OPERATOR]);
        assert!(all().iter().all(|p| p.url.starts_with("https://www.dmv.ca.gov/")));
    }

    #[test]
    fn test_by_id() {
        let dui = by_id(DUI_ADMIN_PER_SE).unwrap();
        assert_eq!(dui.rights.len(), 6);
        assert!(by_id("unknown").is_none());
    }

    #[test]
    fn test_search() {
        let hits = search("NOTS");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, NEGLIGENT_OPERATOR);

        // rights 항목에서도 검색
        let hits = search("interpreter");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, DUI_ADMIN_PER_SE);

        assert_eq!(search("administrative hearing").len(), 3);
        assert!(search("   ").is_empty());
    }
}
