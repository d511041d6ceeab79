//! Common regex patterns for invoice normalization (Hebrew and English documents).

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::invoice::ExpenseType;

lazy_static! {
    // Supplier identifiers: ח.פ. (company number), ע.מ. / עוסק מורשה (licensed dealer),
    // and the usual English labels.
    pub static ref COMPANY_ID_TAGGED: Regex = Regex::new(
        r#"(?i)(?:ח\.?\s?פ\.?|ע\.?\s?מ\.?|עוסק\s+מורשה|vat\s*(?:no|number|reg(?:istration)?(?:\s*no)?)|company\s*(?:no|number|id)|tax\s*id|reg\.?\s*no)[\s.:#"'׳״]*(\d[\d\s\-]{6,12}\d)"#
    ).unwrap();

    // Dates
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})\b"
    ).unwrap();

    // Keys in the opaque page data
    pub static ref TOTAL_KEY: Regex = Regex::new(
        r#"(?i)(total|grand\s*total|amount\s*due|סה["״]?כ|סך\s*הכל|לתשלום|סכום\s*כולל)"#
    ).unwrap();

    pub static ref ITEM_CHARGE_KEY: Regex = Regex::new(
        r#"(?i)(total|amount|sum|charge|סה["״]?כ|סכום|סך|לתשלום)"#
    ).unwrap();

    pub static ref ITEM_PRICE_KEY: Regex = Regex::new(
        r"(?i)(price|cost|מחיר|עלות)"
    ).unwrap();

    pub static ref VAT_KEY: Regex = Regex::new(
        r#"(?i)(\bvat\b|מע["״]?מ)"#
    ).unwrap();

    pub static ref VAT_INCLUSIVE_KEY: Regex = Regex::new(
        r"(?i)(incl|כולל|לתשלום)"
    ).unwrap();

    // Pre-VAT subtotals
    pub static ref NET_KEY: Regex = Regex::new(
        r"(?i)(before|excl|without|\bnet\b|לפני|ללא)"
    ).unwrap();

    // Identifier labels that may mention VAT ("VAT No.")
    pub static ref IDENTIFIER_KEY: Regex = Regex::new(
        r"(?i)(\bno\b|number|\bid\b|reg|מספר|עוסק|ח\.?\s?פ)"
    ).unwrap();

    pub static ref RATE_KEY: Regex = Regex::new(
        r"(?i)(rate|%|percent|שיעור|אחוז)"
    ).unwrap();

    pub static ref INVOICE_NUMBER_KEY: Regex = Regex::new(
        r#"(?i)(invoice\s*(?:no|number|#)|receipt\s*(?:no|number|#)|מספר\s*(?:חשבונית|קבלה)|(?:חשבונית|קבלה)(?:\s*מס)?\s*(?:מס['׳]?|מספר))"#
    ).unwrap();

    pub static ref DATE_KEY: Regex = Regex::new(
        r"(?i)(date|תאריך)"
    ).unwrap();

    // Rows of a table that summarize rather than charge
    pub static ref SUMMARY_ROW: Regex = Regex::new(
        r#"(?i)^\s*(total|subtotal|sub-total|sum|vat|balance|סה["״]?כ|סך\s*הכל|לתשלום|מע["״]?מ|יתרה)"#
    ).unwrap();

    // Software, hosting and network services are always office expenses.
    // Matched against page values only, never keys.
    pub static ref OFFICE_OVERRIDE: Regex = Regex::new(
        r"(?i)(software\s*(?:licen[cs]e|subscription|service)|\bsaas\b|web\s*hosting|hosting\s*(?:plan|service|package)|domain\s*(?:name|renewal|registration)|cloud\s*(?:service|storage|hosting)|internet\s*(?:service|access|connection|package)|server\s*(?:hosting|rental)|\bvps\b|רישיון\s*תוכנה|מנוי\s*תוכנה|תוכנה|אחסון\s*(?:אתרים|אתר|ענן)|שירותי\s*אינטרנט|חבילת\s*אינטרנט|דומיין)"
    ).unwrap();

    // Amount-shaped token inside free text ("117.00 (incl. 17% VAT)")
    pub static ref AMOUNT_TOKEN: Regex = Regex::new(
        r"\d(?:[\d.,]*\d)?"
    ).unwrap();

    // Currency markers
    pub static ref CURRENCY_ILS: Regex = Regex::new(r#"(?i)(₪|\bils\b|\bnis\b|ש["״]ח|שקל)"#).unwrap();
    pub static ref CURRENCY_USD: Regex = Regex::new(r"(?i)(\$|\busd\b|דולר)").unwrap();
    pub static ref CURRENCY_EUR: Regex = Regex::new(r"(?i)(€|\beur\b|\beuro\b|יורו)").unwrap();
    pub static ref CURRENCY_GBP: Regex = Regex::new(r"(?i)(£|\bgbp\b)").unwrap();

    static ref CLASSIFICATION_CUES: Vec<(ExpenseType, Regex)> = vec![
        (ExpenseType::Parking, Regex::new(
            r"(?i)(parking|car\s*park|easypark|pango|cellopark|חניה|חנייה|חניון)"
        ).unwrap()),
        (ExpenseType::Gas, Regex::new(
            r"(?i)(fuel|petrol|gasoline|diesel|gas\s*station|octane|דלק|סולר|בנזין|אוקטן|תחנת\s*תדלוק)"
        ).unwrap()),
        (ExpenseType::OtherVehicle, Regex::new(
            r"(?i)(vehicle|car\s*wash|tyres?|tires?|garage|toll|רכב|מוסך|צמיג|שטיפ|רישוי|כביש\s*6|טסט)"
        ).unwrap()),
        (ExpenseType::Clothing, Regex::new(
            r"(?i)(clothing|apparel|shirt|trousers|shoes|uniform|ביגוד|בגדים|חולצ|מכנס|נעלי)"
        ).unwrap()),
        (ExpenseType::Office, Regex::new(
            r"(?i)(office|stationery|printer|toner|paper|משרד|טונר|נייר|מדפסת|ציוד\s*משרדי)"
        ).unwrap()),
        (ExpenseType::Supplies, Regex::new(
            r"(?i)(supplies|equipment|tools|hardware\s*store|ציוד|כלי\s*עבודה|חומרי)"
        ).unwrap()),
        (ExpenseType::Maintenance, Regex::new(
            r"(?i)(maintenance|repair|plumb|electrician|cleaning|תיקון|אחזקה|תחזוקה|אינסטלצי|חשמלאי|ניקיון)"
        ).unwrap()),
        (ExpenseType::Food, Regex::new(
            r"(?i)(restaurant|cafe|café|coffee|meal|food|supermarket|bakery|pizza|מסעדה|קפה|מזון|ארוחה|סופר|מאפיי?ה|פיצה)"
        ).unwrap()),
    ];
}

/// Content cues per expense category.
pub fn classification_cues() -> &'static [(ExpenseType, Regex)] {
    &CLASSIFICATION_CUES
}
