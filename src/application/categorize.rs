use crate::domain::bill::ExpenseCategory;
use crate::domain::extraction::ExtractedFields;

/// Keyword table per category. Matching is plain substring search over the
/// lowercased document text; table order carries no precedence.
const KEYWORDS: &[(ExpenseCategory, &[&str])] = &[
    (
        ExpenseCategory::Software,
        &[
            "software",
            "saas",
            "subscription",
            "license",
            "cloud",
            "hosting",
            "api",
            "compute",
        ],
    ),
    (
        ExpenseCategory::OfficeSupplies,
        &[
            "office",
            "paper",
            "supplies",
            "stationery",
            "toner",
            "ink",
            "desk",
            "chair",
        ],
    ),
    (
        ExpenseCategory::Marketing,
        &[
            "marketing",
            "advertising",
            "campaign",
            "branding",
            "seo",
            "social media",
            "sponsorship",
            "promo",
        ],
    ),
    (
        ExpenseCategory::Utilities,
        &[
            "electric",
            "electricity",
            "water",
            "gas",
            "internet",
            "broadband",
            "telecom",
            "utility",
        ],
    ),
    (
        ExpenseCategory::ProfessionalServices,
        &[
            "consulting",
            "legal",
            "accounting",
            "audit",
            "attorney",
            "advisory",
            "bookkeeping",
            "notary",
        ],
    ),
    (
        ExpenseCategory::Travel,
        &[
            "travel", "flight", "airfare", "hotel", "lodging", "mileage", "taxi", "rail",
        ],
    ),
];

/// Derives a spending category from extracted document text.
///
/// Scans the vendor name, description and line items for category keywords
/// and picks the clear winner. Ambiguous input (a tie, or no keyword at all)
/// lands in `Other` rather than guessing; this function never fails.
pub fn categorize(fields: &ExtractedFields) -> ExpenseCategory {
    let mut haystack = String::new();
    if let Some(vendor) = &fields.vendor_name {
        haystack.push_str(vendor);
        haystack.push(' ');
    }
    if let Some(description) = &fields.description {
        haystack.push_str(description);
        haystack.push(' ');
    }
    for item in &fields.line_items {
        haystack.push_str(&item.description);
        haystack.push(' ');
    }
    categorize_text(&haystack)
}

pub fn categorize_text(text: &str) -> ExpenseCategory {
    let haystack = text.to_lowercase();

    let mut best = ExpenseCategory::Other;
    let mut best_count = 0usize;
    let mut tied = false;
    for (category, keywords) in KEYWORDS {
        let count = keywords.iter().filter(|kw| haystack.contains(**kw)).count();
        if count > best_count {
            best = *category;
            best_count = count;
            tied = false;
        } else if count == best_count && count > 0 {
            tied = true;
        }
    }

    if best_count == 0 || tied {
        ExpenseCategory::Other
    } else {
        best
    }
}
