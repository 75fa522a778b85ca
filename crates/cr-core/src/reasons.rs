//! Human-readable reasons for ranked attributions.

use crate::attribution::{Attribution, Direction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language used for rendered reasons.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Vi,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower.starts_with("vi") {
            Ok(Locale::Vi)
        } else if lower.starts_with("en") {
            Ok(Locale::En)
        } else {
            Err(format!("Unsupported locale: {}. Use 'en' or 'vi'", s))
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::En => write!(f, "en"),
            Locale::Vi => write!(f, "vi"),
        }
    }
}

/// One rendered reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reason {
    pub feature: String,
    pub title: String,
    pub text: String,
    pub direction: Direction,
}

struct Phrase {
    title: &'static str,
    label: &'static str,
}

struct CatalogEntry {
    feature: &'static str,
    en: Phrase,
    vi: Phrase,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        feature: "email_overdue_ratio",
        en: Phrase { title: "Email overdue ratio", label: "Overdue/collection email ratio" },
        vi: Phrase { title: "Tỷ lệ email quá hạn", label: "Tỷ lệ email nhắc nợ/quá hạn" },
    },
    CatalogEntry {
        feature: "sms_fin_ratio",
        en: Phrase { title: "Financial SMS density", label: "Share of finance-related SMS" },
        vi: Phrase { title: "Mật độ SMS tài chính", label: "Tỷ lệ SMS liên quan tài chính" },
    },
    CatalogEntry {
        feature: "sms_count",
        en: Phrase { title: "Total SMS count", label: "Total SMS" },
        vi: Phrase { title: "Số lượng SMS", label: "Tổng số SMS" },
    },
    CatalogEntry {
        feature: "contacts_count",
        en: Phrase { title: "Contacts size", label: "Contacts count" },
        vi: Phrase { title: "Quy mô danh bạ", label: "Tổng số liên hệ" },
    },
    CatalogEntry {
        feature: "ecom_cat_fashion_ratio",
        en: Phrase { title: "Fashion spending ratio", label: "Share of 'fashion' in e-commerce" },
        vi: Phrase { title: "Tỷ lệ chi tiêu thời trang", label: "Tỷ trọng giao dịch 'fashion'" },
    },
    CatalogEntry {
        feature: "social_posts_sum",
        en: Phrase { title: "Social activity (posts)", label: "Total posts" },
        vi: Phrase { title: "Hoạt động mạng xã hội (bài viết)", label: "Tổng số bài đăng" },
    },
    CatalogEntry {
        feature: "social_likes_sum",
        en: Phrase { title: "Social engagement (likes)", label: "Total likes" },
        vi: Phrase { title: "Tương tác mạng xã hội (lượt thích)", label: "Tổng số lượt thích" },
    },
    CatalogEntry {
        feature: "monthly_income_vnd",
        en: Phrase { title: "Monthly income", label: "Income (VND)" },
        vi: Phrase { title: "Thu nhập hàng tháng", label: "Thu nhập (VND)" },
    },
];

fn direction_phrase(direction: Direction, locale: Locale) -> &'static str {
    match (direction, locale) {
        (Direction::Up, Locale::En) => "increases risk",
        (Direction::Down, Locale::En) => "decreases risk",
        (Direction::Up, Locale::Vi) => "tăng rủi ro",
        (Direction::Down, Locale::Vi) => "giảm rủi ro",
    }
}

/// Renders a single attribution.
pub fn render_reason(attribution: &Attribution, locale: Locale) -> Reason {
    let entry = CATALOG.iter().find(|e| e.feature == attribution.feature);
    let (title, label) = match (entry, locale) {
        (Some(e), Locale::En) => (e.en.title.to_string(), e.en.label.to_string()),
        (Some(e), Locale::Vi) => (e.vi.title.to_string(), e.vi.label.to_string()),
        (None, Locale::En) => (format!("Feature: {}", attribution.feature), "Value".to_string()),
        (None, Locale::Vi) => (format!("Yếu tố: {}", attribution.feature), "Giá trị".to_string()),
    };

    let text = format!(
        "{} = {} {} ({:.3}).",
        label,
        attribution.value,
        direction_phrase(attribution.direction, locale),
        attribution.abs_contribution
    );

    Reason {
        feature: attribution.feature.clone(),
        title,
        text,
        direction: attribution.direction,
    }
}

/// Renders every attribution, preserving rank order.
pub fn render_reasons(attributions: &[Attribution], locale: Locale) -> Vec<Reason> {
    attributions
        .iter()
        .map(|a| render_reason(a, locale))
        .collect()
}
