use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td,th").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static GROUPED_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]{1,3}(?:,[0-9]{3})*(?:\.[0-9]+)?)").unwrap());

/// Parses a scraped number, tolerating thousands separators and whitespace.
///
/// `"1,234.50"` -> `Some(1234.5)`; empty or non-numeric input -> `None`.
pub fn safe_num(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Like [`safe_num`] but first strips everything that is not a digit, dot,
/// comma or minus sign (`"998.4元"` -> 998.4).
pub fn loose_num(raw: &str) -> Option<f64> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    safe_num(&kept)
}

/// First `12,345.6`-style number appearing anywhere in `raw`.
pub fn first_grouped_number(raw: &str) -> Option<f64> {
    GROUPED_NUMBER
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| safe_num(m.as_str()))
}

pub fn collapse_whitespace(raw: &str) -> String {
    WHITESPACE.replace_all(raw, " ").into_owned()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Whole-page text of `<body>` with whitespace runs collapsed to one space.
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let raw = match document.select(&BODY).next() {
        Some(body) => element_text(body),
        None => document.root_element().text().collect::<String>(),
    };
    collapse_whitespace(&raw).trim().to_string()
}

/// Non-empty cell texts of every `<tr>` with at least `min_cells` cells.
pub fn table_rows(html: &str, min_cells: usize) -> Vec<Vec<String>> {
    let document = Html::parse_document(html);
    document
        .select(&ROW)
        .map(|tr| {
            tr.select(&CELL)
                .map(|cell| collapse_whitespace(&element_text(cell)).trim().to_string())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|cells| cells.len() >= min_cells)
        .collect()
}

/// Applies `re` to `text` and parses capture group 1.
pub fn capture_num(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| safe_num(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_num() {
        assert_eq!(safe_num("1,234.50"), Some(1234.5));
        assert_eq!(safe_num("  99.9  "), Some(99.9));
        assert_eq!(safe_num("12,345.67"), Some(12345.67));
        assert_eq!(safe_num("abc"), None);
        assert_eq!(safe_num(""), None);
        assert_eq!(safe_num("   "), None);
        assert_eq!(safe_num("inf"), None);
    }

    #[test]
    fn test_loose_num_strips_units() {
        assert_eq!(loose_num("998.4元/克"), Some(998.4));
        assert_eq!(loose_num("19,420"), Some(19420.0));
        assert_eq!(loose_num("998.4 - 999.0"), None);
    }

    #[test]
    fn test_first_grouped_number() {
        assert_eq!(first_grouped_number("998.4 - 999.0"), Some(998.4));
        assert_eq!(first_grouped_number("19,400-19,440"), Some(19400.0));
        assert_eq!(first_grouped_number("n/a"), None);
    }

    #[test]
    fn test_page_text_flattens_markup() {
        let html = "<html><body><div>1#铜</div>\n\n<span> 80,100—80,300 </span><b>80,200</b></body></html>";
        assert_eq!(page_text(html), "1#铜 80,100—80,300 80,200");
    }

    #[test]
    fn test_table_rows_drops_short_rows() {
        let html = r#"
            <table>
              <tr><th>名称</th><th>价格范围</th><th>均价</th><th>涨跌</th><th>单位</th><th>日期</th></tr>
              <tr><td>99黄金价格</td><td>998.0-999.0</td><td>998.4</td><td>+1.2</td><td>元/克</td><td>01-07</td></tr>
              <tr><td>footer</td><td></td></tr>
            </table>"#;
        let rows = table_rows(html, 5);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], "99黄金价格");
        assert_eq!(rows[1][2], "998.4");
    }
}
