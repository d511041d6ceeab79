//! Invoice record models.
//!
//! A record is the ordered list of per-page extraction results. Each page keeps whatever
//! keys the extraction service produced (in the document's own language) as an opaque map;
//! exactly one page additionally carries the normalized [`InvoiceSummary`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which a page carries the invoice summary.
pub const SUMMARY_KEY: &str = "invoice_summary";

/// Closed expense taxonomy.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ExpenseType {
    #[serde(rename = "parking")]
    Parking,
    #[serde(rename = "gas")]
    Gas,
    #[serde(rename = "other_vehicle")]
    OtherVehicle,
    #[serde(rename = "clothing")]
    Clothing,
    #[serde(rename = "office")]
    Office,
    #[serde(rename = "supplies")]
    Supplies,
    #[serde(rename = "maintenance")]
    Maintenance,
    #[serde(rename = "food")]
    Food,
    /// Could not be deduced.
    #[default]
    #[serde(rename = "?")]
    Unknown,
}

impl ExpenseType {
    /// Every known category, in code order.
    pub const KNOWN: [ExpenseType; 8] = [
        ExpenseType::Parking,
        ExpenseType::Gas,
        ExpenseType::OtherVehicle,
        ExpenseType::Clothing,
        ExpenseType::Office,
        ExpenseType::Supplies,
        ExpenseType::Maintenance,
        ExpenseType::Food,
    ];

    /// Code written to `type_code`.
    pub fn code(&self) -> &'static str {
        match self {
            ExpenseType::Parking => "parking",
            ExpenseType::Gas => "gas",
            ExpenseType::OtherVehicle => "other_vehicle",
            ExpenseType::Clothing => "clothing",
            ExpenseType::Office => "office",
            ExpenseType::Supplies => "supplies",
            ExpenseType::Maintenance => "maintenance",
            ExpenseType::Food => "food",
            ExpenseType::Unknown => "?",
        }
    }

    /// Human label written to `expense_type`.
    pub fn label(&self) -> &'static str {
        match self {
            ExpenseType::Parking => "Parking",
            ExpenseType::Gas => "Fuel",
            ExpenseType::OtherVehicle => "Vehicle expenses",
            ExpenseType::Clothing => "Clothing",
            ExpenseType::Office => "Office expenses",
            ExpenseType::Supplies => "Supplies",
            ExpenseType::Maintenance => "Maintenance",
            ExpenseType::Food => "Food",
            ExpenseType::Unknown => "Unknown",
        }
    }

    /// Whether charges must be attributed to known vehicles.
    pub fn is_vehicle(&self) -> bool {
        matches!(
            self,
            ExpenseType::Parking | ExpenseType::Gas | ExpenseType::OtherVehicle
        )
    }

    /// Parse a code, label or common synonym (English or Hebrew).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        let s = s.trim_matches(|c: char| c == '"' || c == '\'' || c == '.');

        match s {
            "parking" | "חניה" | "חנייה" => Some(ExpenseType::Parking),
            "gas" | "fuel" | "petrol" | "diesel" | "דלק" => Some(ExpenseType::Gas),
            "other_vehicle" | "other-vehicle" | "vehicle" | "vehicle expenses" | "car"
            | "רכב" | "הוצאות רכב" => Some(ExpenseType::OtherVehicle),
            "clothing" | "clothes" | "ביגוד" => Some(ExpenseType::Clothing),
            "office" | "office expenses" | "משרד" | "הוצאות משרד" => {
                Some(ExpenseType::Office)
            }
            "supplies" | "equipment" | "ציוד" => Some(ExpenseType::Supplies),
            "maintenance" | "repairs" | "אחזקה" | "תחזוקה" => Some(ExpenseType::Maintenance),
            "food" | "food expenses" | "meals" | "מזון" | "כיבוד" => Some(ExpenseType::Food),
            "?" | "unknown" => Some(ExpenseType::Unknown),
            _ => None,
        }
    }
}

/// Explicit record of the VAT condition of an invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VatStatus {
    /// VAT stated and non-zero.
    Present,
    /// VAT stated as zero.
    Zero,
    /// VAT not stated at all.
    #[default]
    Absent,
}

/// Normalized financial digest of one invoice.
///
/// `vat_amount` is always serialized (as `null` when VAT is absent or zero). Currency and
/// vehicle fields are omitted when they do not apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    /// Total charge, VAT-inclusive when VAT applies.
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub total_charge: Decimal,

    #[serde(with = "rust_decimal::serde::arbitrary_precision_option", default)]
    pub vat_amount: Option<Decimal>,

    pub vat_included: bool,

    #[serde(default)]
    pub vat_status: VatStatus,

    pub date_of_invoice: Option<String>,

    pub invoice_number: Option<String>,

    pub expense_type: String,

    pub type_code: ExpenseType,

    /// Supplier tax/registration identifier.
    pub company_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Rate to the local currency; omitted when no rate could be obtained.
    #[serde(
        with = "rust_decimal::serde::arbitrary_precision_option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub exchange_rate: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_items: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u32>,

    pub input_file: Option<String>,

    pub dropbox_link: Option<String>,

    /// Validation notes recorded during normalization.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl InvoiceSummary {
    /// Set classification, keeping label and code consistent.
    pub fn set_expense_type(&mut self, expense_type: ExpenseType) {
        self.type_code = expense_type;
        self.expense_type = expense_type.label().to_string();
    }
}

/// One page of an invoice record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// Keys produced by the extraction service, kept verbatim.
    #[serde(flatten)]
    pub fields: Map<String, Value>,

    /// Normalized summary (on exactly one page of a record).
    #[serde(rename = "invoice_summary", default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<InvoiceSummary>,
}

impl PageResult {
    /// Page with no chargeable data.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_fields(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            summary: None,
        }
    }
}

/// A complete normalized invoice: pages in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceRecord {
    pub pages: Vec<PageResult>,
}

impl InvoiceRecord {
    /// Index of the page carrying the summary.
    pub fn summary_page(&self) -> Option<usize> {
        self.pages.iter().position(|p| p.summary.is_some())
    }

    pub fn summary(&self) -> Option<&InvoiceSummary> {
        self.pages.iter().find_map(|p| p.summary.as_ref())
    }

    pub fn summary_mut(&mut self) -> Option<&mut InvoiceSummary> {
        self.pages.iter_mut().find_map(|p| p.summary.as_mut())
    }
}
