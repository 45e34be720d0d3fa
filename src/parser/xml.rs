// src/parser/xml.rs

//! Deterministic parser for the federal NF-e/NFC-e XML schema.
//!
//! Extraction reads the schema's fixed element names regardless of namespace
//! prefix: emission date (`dhEmi`/`dEmi`), issuer (`emit/xNome`), grand total
//! (`total/ICMSTot/vNF`), document key (`chNFe` or `infNFe@Id`), and one
//! `det/prod` block per item.

use bigdecimal::{BigDecimal, Zero};
use chrono::{NaiveDate, NaiveDateTime};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{AppError, Result};
use crate::models::{ParsedDocument, ParsedItem, SourceKind};
use crate::utils::{decimal_from_xml, normalize_access_key};

/// Raw text captured for one `det/prod` block.
#[derive(Debug, Default)]
struct RawItem {
    name: Option<String>,
    quantity: Option<String>,
    unit: Option<String>,
    unit_price: Option<String>,
    total_price: Option<String>,
}

/// Parse a federal-schema XML document into the canonical model.
///
/// Fails with `MalformedDocument` when the bytes are not well-formed XML and
/// with `SchemaMismatch` when required fields are absent. A document with
/// zero `det` blocks is valid — header-only receipts parse to an empty item
/// list.
pub fn parse_xml(bytes: &[u8]) -> Result<ParsedDocument> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut saw_inf_nfe = false;
    let mut in_emit = false;
    let mut in_prod = false;

    let mut dh_emi: Option<String> = None;
    let mut d_emi: Option<String> = None;
    let mut issuer: Option<String> = None;
    let mut total_raw: Option<String> = None;
    let mut ch_nfe: Option<String> = None;
    let mut id_attr: Option<String> = None;

    let mut raw_items: Vec<RawItem> = Vec::new();
    let mut current_item: Option<RawItem> = None;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(AppError::malformed(e)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(start)) => {
                let name = local_name(&start);
                match name.as_str() {
                    "infNFe" => {
                        saw_inf_nfe = true;
                        if id_attr.is_none() {
                            id_attr = attribute(&start, "Id");
                        }
                    }
                    "det" => current_item = Some(RawItem::default()),
                    "prod" if current_item.is_some() => in_prod = true,
                    "emit" => in_emit = true,
                    _ => {}
                }
                stack.push(name);
            }
            Ok(Event::Empty(empty)) => {
                if local_name(&empty) == "infNFe" {
                    saw_inf_nfe = true;
                    if id_attr.is_none() {
                        id_attr = attribute(&empty, "Id");
                    }
                }
            }
            Ok(Event::End(end)) => {
                let name = String::from_utf8_lossy(end.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "det" => {
                        if let Some(item) = current_item.take() {
                            raw_items.push(item);
                        }
                    }
                    "prod" => in_prod = false,
                    "emit" => in_emit = false,
                    _ => {}
                }
                stack.pop();
            }
            Ok(Event::Text(text)) => {
                let value = text
                    .unescape()
                    .map_err(AppError::malformed)?
                    .trim()
                    .to_string();
                if value.is_empty() {
                    continue;
                }
                let Some(leaf) = stack.last() else { continue };

                if in_prod {
                    if let Some(item) = current_item.as_mut() {
                        // Unknown extra item fields fall through and are ignored.
                        match leaf.as_str() {
                            "xProd" => item.name = Some(value),
                            "qCom" => item.quantity = Some(value),
                            "uCom" => item.unit = Some(value),
                            "vUnCom" => item.unit_price = Some(value),
                            "vProd" => item.total_price = Some(value),
                            _ => {}
                        }
                    }
                    continue;
                }

                match leaf.as_str() {
                    "dhEmi" if dh_emi.is_none() => dh_emi = Some(value),
                    "dEmi" if d_emi.is_none() => d_emi = Some(value),
                    "xNome" if in_emit && issuer.is_none() => issuer = Some(value),
                    "vNF" if total_raw.is_none() => total_raw = Some(value),
                    "chNFe" if ch_nfe.is_none() => ch_nfe = Some(value),
                    _ => {}
                }
            }
            Ok(_) => {}
        }
        buf.clear();
    }

    if !saw_inf_nfe {
        return Err(AppError::schema("infNFe document body not found"));
    }

    let emitted_at = parse_emission(dh_emi.as_deref(), d_emi.as_deref())?;

    let issuer_name = issuer.ok_or_else(|| AppError::schema("issuer name (emit/xNome) not found"))?;

    let total_raw = total_raw.ok_or_else(|| AppError::schema("grand total (vNF) not found"))?;
    let total_amount = decimal_from_xml(&total_raw)
        .ok_or_else(|| AppError::schema(format!("grand total '{total_raw}' is not a number")))?;

    let key_raw = ch_nfe
        .or(id_attr)
        .ok_or_else(|| AppError::schema("access key (chNFe or infNFe@Id) not found"))?;
    let access_key = normalize_access_key(&key_raw)
        .ok_or_else(|| AppError::schema(format!("access key '{key_raw}' is not a 44-digit key")))?;

    let mut items = Vec::with_capacity(raw_items.len());
    for (index, raw) in raw_items.into_iter().enumerate() {
        items.push(build_item(index, raw)?);
    }

    Ok(ParsedDocument {
        access_key,
        issuer_name,
        emitted_at,
        total_amount,
        source: SourceKind::Xml,
        items,
    })
}

/// Emission timestamp: `dhEmi` (full date-time) preferred over `dEmi` (date
/// only, mapped to midnight).
fn parse_emission(dh_emi: Option<&str>, d_emi: Option<&str>) -> Result<NaiveDateTime> {
    if let Some(raw) = dh_emi {
        if raw.len() >= 19 {
            if let Ok(dt) = NaiveDateTime::parse_from_str(&raw[..19], "%Y-%m-%dT%H:%M:%S") {
                return Ok(dt);
            }
        }
        return date_at_midnight(raw);
    }
    if let Some(raw) = d_emi {
        return date_at_midnight(raw);
    }
    Err(AppError::schema("emission date (dhEmi/dEmi) not found"))
}

fn date_at_midnight(raw: &str) -> Result<NaiveDateTime> {
    if raw.len() < 10 {
        return Err(AppError::schema(format!("emission date '{raw}' is not a date")));
    }
    NaiveDate::parse_from_str(&raw[..10], "%Y-%m-%d")
        .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is valid"))
        .map_err(|e| AppError::schema(format!("emission date '{raw}': {e}")))
}

/// Quantity and unit price come from their own schema nodes (`qCom`,
/// `vUnCom`); they are never computed from `vProd`, which keeps rounding the
/// authority applied.
fn build_item(index: usize, raw: RawItem) -> Result<ParsedItem> {
    let label = || format!("item {}", index + 1);

    let product_name = raw
        .name
        .ok_or_else(|| AppError::schema(format!("{}: product name (xProd) missing", label())))?;

    let quantity_raw = raw
        .quantity
        .ok_or_else(|| AppError::schema(format!("{}: quantity (qCom) missing", label())))?;
    let quantity = decimal_from_xml(&quantity_raw).ok_or_else(|| {
        AppError::schema(format!("{}: quantity '{quantity_raw}' is not a number", label()))
    })?;
    if quantity <= BigDecimal::zero() {
        return Err(AppError::schema(format!(
            "{}: quantity '{quantity_raw}' is not positive",
            label()
        )));
    }

    let unit_price_raw = raw
        .unit_price
        .ok_or_else(|| AppError::schema(format!("{}: unit price (vUnCom) missing", label())))?;
    let unit_price = decimal_from_xml(&unit_price_raw).ok_or_else(|| {
        AppError::schema(format!(
            "{}: unit price '{unit_price_raw}' is not a number",
            label()
        ))
    })?;

    // vProd can be absent on some emitters; the unit price stands in, but the
    // reverse derivation never happens.
    let total_price = match raw.total_price {
        Some(total_raw) => decimal_from_xml(&total_raw).ok_or_else(|| {
            AppError::schema(format!("{}: total price '{total_raw}' is not a number", label()))
        })?,
        None => unit_price.clone(),
    };

    Ok(ParsedItem {
        product_name,
        quantity,
        unit_price,
        total_price,
        unit: raw.unit,
    })
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn attribute(start: &BytesStart<'_>, name: &str) -> Option<String> {
    start.attributes().flatten().find_map(|attr| {
        if attr.key.local_name().as_ref() == name.as_bytes() {
            Some(String::from_utf8_lossy(&attr.value).into_owned())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const KEY: &str = "33260210697697000660651070003680661266494182";

    fn sample_xml(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe">
  <NFe>
    <infNFe Id="NFe{KEY}" versao="4.00">
      <ide><dhEmi>2026-02-11T07:35:22-03:00</dhEmi></ide>
      <emit><xNome>Mercado Modelo LTDA</xNome><CNPJ>06976969000660</CNPJ></emit>
      <dest><xNome>Fulano de Tal</xNome></dest>
      {items}
      <total><ICMSTot><vNF>23.33</vNF></ICMSTot></total>
    </infNFe>
  </NFe>
</nfeProc>"#
        )
    }

    fn two_items() -> &'static str {
        // vProd values carry authority rounding and deliberately differ from
        // quantity * unit price.
        r#"<det nItem="1"><prod>
             <cProd>101</cProd><xProd>ARROZ TIPO 1</xProd>
             <qCom>2</qCom><uCom>UN</uCom><vUnCom>10.00</vUnCom><vProd>19.99</vProd>
           </prod></det>
           <det nItem="2"><prod>
             <cProd>102</cProd><xProd>TOMATE KG</xProd>
             <qCom>1.5</qCom><uCom>KG</uCom><vUnCom>3.33</vUnCom><vProd>5.00</vProd>
           </prod></det>"#
    }

    #[test]
    fn parses_two_item_document() {
        let parsed = parse_xml(sample_xml(two_items()).as_bytes()).unwrap();

        assert_eq!(parsed.access_key, KEY);
        assert_eq!(parsed.issuer_name, "Mercado Modelo LTDA");
        assert_eq!(parsed.source, SourceKind::Xml);
        assert_eq!(parsed.total_amount, BigDecimal::from_str("23.33").unwrap());
        assert_eq!(
            parsed.emitted_at,
            NaiveDate::from_ymd_opt(2026, 2, 11)
                .unwrap()
                .and_hms_opt(7, 35, 22)
                .unwrap()
        );

        assert_eq!(parsed.items.len(), 2);
        let first = &parsed.items[0];
        assert_eq!(first.product_name, "ARROZ TIPO 1");
        assert_eq!(first.quantity, BigDecimal::from_str("2").unwrap());
        assert_eq!(first.unit_price, BigDecimal::from_str("10.00").unwrap());
        assert_eq!(first.total_price, BigDecimal::from_str("19.99").unwrap());
        assert_eq!(first.unit.as_deref(), Some("UN"));

        let second = &parsed.items[1];
        assert_eq!(second.quantity, BigDecimal::from_str("1.5").unwrap());
        assert_eq!(second.unit_price, BigDecimal::from_str("3.33").unwrap());
        // Independent of quantity * unit_price (= 4.995).
        assert_eq!(second.total_price, BigDecimal::from_str("5.00").unwrap());
    }

    #[test]
    fn header_only_document_parses_with_zero_items() {
        let parsed = parse_xml(sample_xml("").as_bytes()).unwrap();
        assert!(parsed.items.is_empty());
        assert_eq!(parsed.total_amount, BigDecimal::from_str("23.33").unwrap());
    }

    #[test]
    fn access_key_prefers_chnfe_over_id_attribute() {
        let other = "43210987654321098765432109876543210987654321";
        let xml = sample_xml(&format!("<protNFe><infProt><chNFe>{other}</chNFe></infProt></protNFe>"));
        let parsed = parse_xml(xml.as_bytes()).unwrap();
        assert_eq!(parsed.access_key, other);
    }

    #[test]
    fn dest_name_is_not_mistaken_for_issuer() {
        let parsed = parse_xml(sample_xml("").as_bytes()).unwrap();
        assert_eq!(parsed.issuer_name, "Mercado Modelo LTDA");
    }

    #[test]
    fn date_only_emission_maps_to_midnight() {
        let xml = sample_xml("").replace(
            "<dhEmi>2026-02-11T07:35:22-03:00</dhEmi>",
            "<dEmi>2026-02-11</dEmi>",
        );
        let parsed = parse_xml(xml.as_bytes()).unwrap();
        assert_eq!(
            parsed.emitted_at,
            NaiveDate::from_ymd_opt(2026, 2, 11)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn missing_total_is_schema_mismatch() {
        let xml = sample_xml("").replace("<total><ICMSTot><vNF>23.33</vNF></ICMSTot></total>", "");
        assert!(matches!(
            parse_xml(xml.as_bytes()),
            Err(AppError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn missing_issuer_is_schema_mismatch() {
        let xml = sample_xml("").replace("<xNome>Mercado Modelo LTDA</xNome>", "");
        assert!(matches!(
            parse_xml(xml.as_bytes()),
            Err(AppError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn missing_document_body_is_schema_mismatch() {
        let xml = "<?xml version=\"1.0\"?><other><thing>1</thing></other>";
        assert!(matches!(
            parse_xml(xml.as_bytes()),
            Err(AppError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn item_missing_quantity_is_schema_mismatch() {
        let xml = sample_xml(
            "<det><prod><xProd>SEM QTDE</xProd><vUnCom>1.00</vUnCom></prod></det>",
        );
        assert!(matches!(
            parse_xml(xml.as_bytes()),
            Err(AppError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn mismatched_end_tags_are_malformed() {
        let xml = b"<infNFe><emit><xNome>X</infNFe></emit>";
        assert!(matches!(
            parse_xml(xml),
            Err(AppError::MalformedDocument(_))
        ));
    }

    #[test]
    fn non_xml_bytes_are_malformed_or_mismatched() {
        // Plain text has no infNFe body; either failure mode is a client error.
        let result = parse_xml(b"this is not xml at all");
        assert!(result.is_err());
    }
}
