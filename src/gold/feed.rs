//! Central-bank metals feed
//!
//! The bank publishes daily precious-metal prices as a small XML document:
//!
//! ```text
//! <Metall FromDate="20261019" ToDate="20261019" name="Precious metals quotations">
//!   <Record Date="19.10.2026" Code="1"><Buy>7512,34</Buy><Sell>7512,34</Sell></Record>
//!   <Record Date="19.10.2026" Code="2"><Buy>95,10</Buy><Sell>95,10</Sell></Record>
//! </Metall>
//! ```
//!
//! Code 1 is gold; prices are per gram with a comma decimal separator.

use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[cfg(feature = "gold_feed")]
use super::{GoldRate, GoldRateSource};
#[cfg(feature = "gold_feed")]
use crate::game::constants::gold;

const GOLD_CODE: &str = "1";
const GRAMS_PER_KG: f64 = 1000.0;

/// Gold feed errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("Feed returned status {0}")]
    Status(u16),
    #[error("No gold record in feed")]
    MissingRecord,
    #[error("Invalid price '{0}'")]
    InvalidPrice(String),
    #[error("Malformed feed: {0}")]
    Malformed(String),
}

/// Request URL for a single day's quotations
pub fn metals_url(base_url: &str, date: NaiveDate) -> String {
    let day = date.format("%d/%m/%Y");
    format!("{base_url}?date_req1={day}&date_req2={day}")
}

#[derive(Debug, Clone, Copy)]
enum PriceField {
    Buy,
    Sell,
}

/// Extract the gold price per kg from a metals document.
/// Prefers the buy price, falls back to the sell price.
pub fn parse_metals_xml(body: &str) -> Result<f64, FeedError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut in_gold = false;
    let mut field = None;
    let mut buy: Option<String> = None;
    let mut sell: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) => match tag.name().as_ref() {
                b"Record" => in_gold = is_gold(&tag)?,
                b"Buy" if in_gold => field = Some(PriceField::Buy),
                b"Sell" if in_gold => field = Some(PriceField::Sell),
                _ => {}
            },
            Ok(Event::Text(text)) => {
                if let Some(field) = field {
                    let value = text
                        .unescape()
                        .map_err(|e| FeedError::Malformed(e.to_string()))?
                        .into_owned();
                    match field {
                        PriceField::Buy => buy = Some(value),
                        PriceField::Sell => sell = Some(value),
                    }
                }
            }
            Ok(Event::End(tag)) => match tag.name().as_ref() {
                b"Record" if in_gold => return gold_price(buy, sell),
                b"Buy" | b"Sell" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(FeedError::Malformed(e.to_string())),
            // Self-closing tags and declarations carry no prices
            Ok(_) => {}
        }
    }

    Err(FeedError::MissingRecord)
}

fn is_gold(tag: &BytesStart<'_>) -> Result<bool, FeedError> {
    let code = tag
        .try_get_attribute("Code")
        .map_err(|e| FeedError::Malformed(e.to_string()))?;
    match code {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|e| FeedError::Malformed(e.to_string()))?;
            Ok(value.trim() == GOLD_CODE)
        }
        None => Ok(false),
    }
}

fn gold_price(buy: Option<String>, sell: Option<String>) -> Result<f64, FeedError> {
    let price = buy
        .filter(|p| !p.is_empty())
        .or(sell.filter(|p| !p.is_empty()))
        .ok_or(FeedError::MissingRecord)?;

    let per_gram: f64 = price
        .replace(',', ".")
        .parse()
        .map_err(|_| FeedError::InvalidPrice(price.clone()))?;
    Ok(per_gram * GRAMS_PER_KG)
}

/// Live feed over HTTP
#[cfg(feature = "gold_feed")]
#[derive(Debug, Clone)]
pub struct CbrGoldFeed {
    client: reqwest::Client,
    base_url: String,
}

#[cfg(feature = "gold_feed")]
impl CbrGoldFeed {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(gold::FETCH_TIMEOUT)
            .build()
            .map_err(|e| FeedError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[cfg(feature = "gold_feed")]
impl GoldRateSource for CbrGoldFeed {
    fn fetch(&self) -> impl std::future::Future<Output = Result<GoldRate, FeedError>> + Send {
        let url = metals_url(&self.base_url, chrono::Local::now().date_naive());
        let client = self.client.clone();

        async move {
            tracing::debug!("Fetching gold rate from {}", url);
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| FeedError::Http(e.to_string()))?;

            if !response.status().is_success() {
                return Err(FeedError::Status(response.status().as_u16()));
            }

            // windows-1251 body; the parts we read are ASCII
            let bytes = response
                .bytes()
                .await
                .map_err(|e| FeedError::Http(e.to_string()))?;
            let body = String::from_utf8_lossy(&bytes);

            let value = parse_metals_xml(&body)?;
            Ok(GoldRate::new(value, gold::DEFAULT_LABEL))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="windows-1251"?>
<Metall FromDate="20261019" ToDate="20261019" name="Precious metals quotations">
<Record Date="19.10.2026" Code="2"><Buy>95,10</Buy><Sell>95,10</Sell></Record>
<Record Date="19.10.2026" Code="1"><Buy>7512,34</Buy><Sell>7600,00</Sell></Record>
</Metall>"#;

    #[test]
    fn test_parse_gold_buy_price() {
        let value = parse_metals_xml(SAMPLE).unwrap();
        assert!((value - 7_512_340.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_falls_back_to_sell() {
        let body = r#"<Metall><Record Date="x" Code="1"><Buy></Buy><Sell>7600,5</Sell></Record></Metall>"#;
        let value = parse_metals_xml(body).unwrap();
        assert!((value - 7_600_500.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_missing_gold() {
        let body = r#"<Metall><Record Date="x" Code="3"><Buy>30,0</Buy></Record></Metall>"#;
        assert!(matches!(parse_metals_xml(body), Err(FeedError::MissingRecord)));
        assert!(matches!(parse_metals_xml(""), Err(FeedError::MissingRecord)));
    }

    #[test]
    fn test_parse_bad_number() {
        let body = r#"<Record Code="1"><Buy>n/a</Buy></Record>"#;
        assert!(matches!(parse_metals_xml(body), Err(FeedError::InvalidPrice(_))));
    }

    #[test]
    fn test_parse_self_closing_gold_record() {
        let body = r#"<Metall><Record Code="1"/><Record Code="2"><Buy>95,10</Buy></Record></Metall>"#;
        assert!(matches!(parse_metals_xml(body), Err(FeedError::MissingRecord)));
    }

    #[test]
    fn test_parse_single_quoted_attributes() {
        let body = "<Metall><Record Date='19.10.2026' Code='1'><Buy>7512,34</Buy></Record></Metall>";
        let value = parse_metals_xml(body).unwrap();
        assert!((value - 7_512_340.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_sell_before_buy() {
        let body = r#"<Record Code="1"><Sell>7600,00</Sell><Buy>7512,34</Buy></Record>"#;
        let value = parse_metals_xml(body).unwrap();
        assert!((value - 7_512_340.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_mismatched_tags() {
        let body = r#"<Metall><Record Code="1"><Buy>7512,34</Sell></Record></Metall>"#;
        assert!(matches!(parse_metals_xml(body), Err(FeedError::Malformed(_))));
    }

    #[test]
    fn test_metals_url() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(
            metals_url("https://www.cbr.ru/scripts/xml_metall.asp", date),
            "https://www.cbr.ru/scripts/xml_metall.asp?date_req1=19/10/2026&date_req2=19/10/2026"
        );
    }
}
