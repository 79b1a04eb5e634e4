//! Structured NF-e field extraction.

use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::error::{ExtractionError, NfeError, Result};
use crate::models::config::ExtractionConfig;
use crate::models::invoice::*;
use crate::models::supplier::SupplierExtractionConfig;
use crate::resolver::{AnnotationFields, OrderNumberResolver, SupplierConfigSource, fields};
use crate::xml::{NodeId, TagReader, XmlDocument};

use super::rules::{ACCESS_KEY_LEN, NO_GTIN};
use super::{AccessKeySource, ExtractionReport, InvoiceExtractor};

/// Extracts [`ParsedInvoice`] records from NF-e XML.
#[derive(Debug, Clone)]
pub struct NfeExtractor {
    resolver: OrderNumberResolver,
    /// Treat `SEM GTIN` barcodes as absent.
    drop_placeholder_barcodes: bool,
    /// Collect advisory warnings in reports.
    validate: bool,
}

impl NfeExtractor {
    /// Create an extractor without supplier configs.
    pub fn new() -> Self {
        let config = ExtractionConfig::default();
        Self {
            resolver: OrderNumberResolver::new(Vec::new()),
            drop_placeholder_barcodes: config.drop_placeholder_barcodes,
            validate: config.validate,
        }
    }

    /// Apply extraction settings.
    pub fn with_config(mut self, config: &ExtractionConfig) -> Self {
        self.drop_placeholder_barcodes = config.drop_placeholder_barcodes;
        self.validate = config.validate;
        self
    }

    /// Use a snapshot of supplier configs for order references.
    pub fn with_supplier_configs(self, configs: Vec<SupplierExtractionConfig>) -> Self {
        self.with_resolver(OrderNumberResolver::new(configs))
    }

    /// Use a preconfigured resolver.
    pub fn with_resolver(mut self, resolver: OrderNumberResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn resolver(&self) -> &OrderNumberResolver {
        &self.resolver
    }

    /// Fetch supplier configs from `source`, then extract.
    ///
    /// A failing source leaves `order_reference` empty; it never fails the import.
    pub async fn extract_with_source<S: SupplierConfigSource>(
        &self,
        xml_text: &str,
        file_name: &str,
        source: &S,
    ) -> Result<ParsedInvoice> {
        let resolver = OrderNumberResolver::from_source(source).await;
        self.clone().with_resolver(resolver).extract(xml_text, file_name)
    }

    /// Extract and collect advisory warnings.
    pub fn extract_report(&self, xml_text: &str, file_name: &str) -> Result<ExtractionReport> {
        let start = Instant::now();
        let (invoice, access_key_source) = self.run(xml_text, file_name)?;

        let warnings = if self.validate {
            invoice.validate()
        } else {
            Vec::new()
        };

        Ok(ExtractionReport {
            invoice,
            access_key_source,
            warnings,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn run(&self, xml_text: &str, file_name: &str) -> Result<(ParsedInvoice, AccessKeySource)> {
        info!("Extracting NF-e from {} ({} bytes)", file_name, xml_text.len());

        let doc = XmlDocument::parse(xml_text)?;
        let reader = TagReader::new(&doc);

        let (access_key, key_source) =
            resolve_access_key(&reader).ok_or(NfeError::MissingAccessKey)?;
        debug!("Access key {} resolved via {:?}", access_key, key_source);

        let invoice = self
            .extract_fields(&reader, access_key, file_name)
            .map_err(|source| {
                error!("Failed to extract fields from {}: {}", file_name, source);
                NfeError::ParseFailure {
                    message: format!("could not read invoice data from {}", file_name),
                    source,
                }
            })?;

        info!(
            "Extracted invoice {} with {} items from {}",
            invoice.number,
            invoice.line_items.len(),
            file_name
        );

        Ok((invoice, key_source))
    }

    fn extract_fields(
        &self,
        reader: &TagReader<'_>,
        access_key: String,
        file_name: &str,
    ) -> std::result::Result<ParsedInvoice, ExtractionError> {
        let inf = reader
            .find("infNFe", None)
            .ok_or(ExtractionError::MissingSection("infNFe"))?;
        let ide = reader
            .find("ide", Some(inf))
            .ok_or(ExtractionError::MissingSection("ide"))?;
        let emit = reader
            .find("emit", Some(inf))
            .ok_or(ExtractionError::MissingSection("emit"))?;

        let number = reader.text_of("nNF", Some(ide));
        let series = reader.text_of("serie", Some(ide));
        let issue_date = reader
            .optional_text_of("dhEmi", Some(ide))
            .unwrap_or_else(|| reader.text_of("dEmi", Some(ide)));

        let seller = read_party(reader, Some(emit), "enderEmit");
        let buyer = read_party(reader, reader.find("dest", Some(inf)), "enderDest");

        let line_items = self.read_line_items(reader, inf, &number);

        let totals = reader.find("total ICMSTot", Some(inf));
        let amount = |tag: &str| {
            totals
                .map(|scope| reader.decimal_of(tag, Some(scope)))
                .unwrap_or(Decimal::ZERO)
        };
        let total_value = amount("vNF");
        let tax_totals = TaxTotals {
            icms: amount("vICMS"),
            ipi: amount("vIPI"),
            pis: amount("vPIS"),
            cofins: amount("vCOFINS"),
        };

        let annotations = read_annotations(reader, inf);
        let order_reference = self
            .resolver
            .resolve(&annotations, seller.tax_id().unwrap_or_default());

        Ok(ParsedInvoice {
            access_key,
            number,
            series,
            issue_date,
            seller,
            buyer,
            line_items,
            total_value,
            tax_totals,
            order_reference,
            file_name: file_name.to_string(),
            imported_at: Utc::now(),
        })
    }

    fn read_line_items(&self, reader: &TagReader<'_>, inf: NodeId, number: &str) -> Vec<LineItem> {
        reader
            .find_all("det", Some(inf))
            .into_iter()
            .enumerate()
            .map(|(index, det)| {
                let position = index + 1;
                let prod = reader.find("prod", Some(det)).unwrap_or(det);
                let scope = Some(prod);

                let code = reader.text_of("cProd", scope);
                let id = if code.is_empty() {
                    format!("{}-{}", number, position)
                } else {
                    code
                };

                LineItem {
                    id,
                    position,
                    description: reader.text_of("xProd", scope),
                    quantity: reader.decimal_of("qCom", scope),
                    unit_price: reader.decimal_of("vUnCom", scope),
                    total: reader.decimal_of("vProd", scope),
                    unit: reader.text_of("uCom", scope),
                    ncm: reader.optional_text_of("NCM", scope),
                    cfop: reader.optional_text_of("CFOP", scope),
                    box_barcode: self.barcode(reader.optional_text_of("cEAN", scope)),
                    unit_barcode: self.barcode(reader.optional_text_of("cEANTrib", scope)),
                }
            })
            .collect()
    }

    fn barcode(&self, value: Option<String>) -> Option<String> {
        value.filter(|code| !(self.drop_placeholder_barcodes && NO_GTIN.is_match(code)))
    }
}

impl Default for NfeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceExtractor for NfeExtractor {
    fn extract(&self, xml_text: &str, file_name: &str) -> Result<ParsedInvoice> {
        self.run(xml_text, file_name).map(|(invoice, _)| invoice)
    }
}

/// Find the 44-character access key.
///
/// Tries, in order: the first `chNFe` anywhere, `chNFe` inside the
/// authorization protocol, and the `infNFe` `Id` attribute minus its
/// 3-character prefix (`NFe`).
pub fn resolve_access_key(reader: &TagReader<'_>) -> Option<(String, AccessKeySource)> {
    let candidates = [
        (AccessKeySource::DirectTag, reader.text_of("chNFe", None)),
        (AccessKeySource::NestedTag, reader.text_of("infProt chNFe", None)),
        (
            AccessKeySource::IdAttribute,
            reader
                .attribute_of("infNFe", "Id", None)
                .map(|id| id.chars().skip(3).collect())
                .unwrap_or_default(),
        ),
    ];

    candidates
        .into_iter()
        .find(|(_, key)| key.chars().count() == ACCESS_KEY_LEN)
        .map(|(source, key)| (key, source))
}

fn read_party(reader: &TagReader<'_>, scope: Option<NodeId>, address_tag: &str) -> Party {
    let Some(scope) = scope else {
        return Party::default();
    };
    let scope = Some(scope);

    let address = match reader.find(address_tag, scope) {
        Some(addr) => {
            let addr = Some(addr);
            Address {
                street: reader.text_of("xLgr", addr),
                number: reader.text_of("nro", addr),
                neighborhood: reader.text_of("xBairro", addr),
                city: reader.text_of("xMun", addr),
                state: reader.text_of("UF", addr),
                zip: reader.text_of("CEP", addr),
            }
        }
        None => Address::default(),
    };

    Party {
        cnpj: reader.optional_text_of("CNPJ", scope),
        cpf: reader.optional_text_of("CPF", scope),
        name: reader.text_of("xNome", scope),
        trade_name: reader.optional_text_of("xFant", scope),
        address,
    }
}

fn read_annotations(reader: &TagReader<'_>, inf: NodeId) -> AnnotationFields {
    let scope = Some(inf);
    let doc = reader.document();
    let mut notes = AnnotationFields::new();

    notes.insert(fields::COMPLEMENTARY_INFO, reader.text_of("infAdic infCpl", scope));

    let buyer_order = reader
        .optional_text_of("compra xPed", scope)
        .unwrap_or_else(|| reader.text_of("xPed", scope));
    notes.insert(fields::BUYER_ORDER, buyer_order);

    notes.insert(fields::FISCAL_NOTES, reader.text_of("infAdic infAdFisco", scope));

    if let Some(adic) = reader.find("infAdic", scope) {
        notes.insert(fields::ADDITIONAL_INFO, doc.text_content(adic));
    }

    let observations: Vec<String> = reader
        .find_all("obsCont", scope)
        .into_iter()
        .map(|obs| reader.text_of("xTexto", Some(obs)))
        .filter(|text| !text.is_empty())
        .collect();
    notes.insert(fields::OBSERVATION, observations.join("\n"));

    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KEY: &str = "35240111222333000181550010000012341000012349";

    fn invoice_xml(items: &str, extra: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe Id="NFe{KEY}" versao="4.00">
      <ide><nNF>1234</nNF><serie>1</serie><dhEmi>2024-01-15T10:30:00-03:00</dhEmi></ide>
      <emit>
        <CNPJ>11222333000181</CNPJ>
        <xNome>Distribuidora Sul Ltda</xNome>
        <xFant>Sul Alimentos</xFant>
        <enderEmit>
          <xLgr>Rua das Flores</xLgr><nro>100</nro><xBairro>Centro</xBairro>
          <xMun>Curitiba</xMun><UF>PR</UF><CEP>80010000</CEP>
        </enderEmit>
      </emit>
      <dest>
        <CPF>52998224725</CPF>
        <xNome>Maria Souza</xNome>
        <enderDest><xLgr>Av. Brasil</xLgr><nro>5</nro><xMun>Londrina</xMun><UF>PR</UF></enderDest>
      </dest>
      {items}
      <total><ICMSTot>
        <vICMS>18.00</vICMS><vIPI>0.00</vIPI><vPIS>1.65</vPIS><vCOFINS>7.60</vCOFINS>
        <vNF>150.00</vNF>
      </ICMSTot></total>
      {extra}
    </infNFe>
  </NFe>
</nfeProc>"#
        )
    }

    fn item(n: usize, code: &str) -> String {
        format!(
            r#"<det nItem="{n}"><prod>
                <cProd>{code}</cProd><cEAN>SEM GTIN</cEAN><xProd>Produto {n}</xProd>
                <NCM>11010010</NCM><CFOP>5102</CFOP><uCom>CX</uCom>
                <qCom>2.0000</qCom><vUnCom>25.0000000000</vUnCom><vProd>50.00</vProd>
                <cEANTrib>7891000100103</cEANTrib>
            </prod></det>"#
        )
    }

    #[test]
    fn test_extract_full_document() {
        let xml = invoice_xml(&item(1, "FAR-01"), "");
        let invoice = NfeExtractor::new().extract(&xml, "nota.xml").unwrap();

        assert_eq!(invoice.access_key, KEY);
        assert_eq!(invoice.number, "1234");
        assert_eq!(invoice.series, "1");
        assert_eq!(invoice.issue_date, "2024-01-15T10:30:00-03:00");
        assert_eq!(invoice.seller.cnpj.as_deref(), Some("11222333000181"));
        assert_eq!(invoice.seller.trade_name.as_deref(), Some("Sul Alimentos"));
        assert_eq!(invoice.seller.address.city, "Curitiba");
        assert_eq!(invoice.seller.address.zip, "80010000");
        assert_eq!(invoice.buyer.cpf.as_deref(), Some("52998224725"));
        assert_eq!(invoice.buyer.cnpj, None);
        assert_eq!(invoice.buyer.address.neighborhood, "");
        assert_eq!(invoice.total_value, Decimal::new(15000, 2));
        assert_eq!(invoice.tax_totals.pis, Decimal::new(165, 2));
        assert_eq!(invoice.file_name, "nota.xml");

        let line = &invoice.line_items[0];
        assert_eq!(line.id, "FAR-01");
        assert_eq!(line.quantity, Decimal::new(2, 0));
        assert_eq!(line.unit_price, Decimal::new(25, 0));
        assert_eq!(line.unit, "CX");
        assert_eq!(line.ncm.as_deref(), Some("11010010"));
        assert_eq!(line.box_barcode, None);
        assert_eq!(line.unit_barcode.as_deref(), Some("7891000100103"));
    }

    #[test]
    fn test_line_items_keep_document_order() {
        let codes = ["C", "A", "B", "D"];
        let items: String = codes
            .iter()
            .enumerate()
            .map(|(i, code)| item(i + 1, code))
            .collect();
        let invoice = NfeExtractor::new()
            .extract(&invoice_xml(&items, ""), "n.xml")
            .unwrap();

        let ids: Vec<&str> = invoice.line_items.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, codes);
        let positions: Vec<usize> = invoice.line_items.iter().map(|l| l.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_blank_product_code_gets_synthetic_id() {
        let items = format!("{}{}", item(1, "X1"), item(2, "  "));
        let invoice = NfeExtractor::new()
            .extract(&invoice_xml(&items, ""), "n.xml")
            .unwrap();
        assert_eq!(invoice.line_items[1].id, "1234-2");
    }

    #[test]
    fn test_access_key_direct_tag_wins() {
        let other = "41240199888777000166550010000000011000000018";
        let protocol = format!("<protNFe><infProt><chNFe>{other}</chNFe></infProt></protNFe>");
        let xml = invoice_xml(&item(1, "A"), "").replace("</NFe>", &format!("</NFe>{protocol}"));

        let doc = XmlDocument::parse(&xml).unwrap();
        let (key, source) = resolve_access_key(&TagReader::new(&doc)).unwrap();
        assert_eq!(key, other);
        assert_eq!(source, AccessKeySource::DirectTag);
    }

    #[test]
    fn test_access_key_nested_when_direct_is_malformed() {
        let xml = r#"<nfeProc>
            <evento><chNFe>123</chNFe></evento>
            <protNFe><infProt><chNFe>35240111222333000181550010000012341000012349</chNFe></infProt></protNFe>
        </nfeProc>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        let (key, source) = resolve_access_key(&TagReader::new(&doc)).unwrap();
        assert_eq!(key, KEY);
        assert_eq!(source, AccessKeySource::NestedTag);
    }

    #[test]
    fn test_access_key_from_id_attribute_strips_three_chars() {
        let xml = invoice_xml(&item(1, "A"), "");
        let report = NfeExtractor::new().extract_report(&xml, "n.xml").unwrap();
        assert_eq!(report.invoice.access_key, KEY);
        assert_eq!(report.access_key_source, AccessKeySource::IdAttribute);

        let xml = xml.replace(&format!("NFe{KEY}"), &format!("XYZ{KEY}"));
        let invoice = NfeExtractor::new().extract(&xml, "n.xml").unwrap();
        assert_eq!(invoice.access_key, KEY);
    }

    #[test]
    fn test_missing_access_key() {
        let xml = invoice_xml(&item(1, "A"), "").replace(&format!("NFe{KEY}"), "NFe123");
        let err = NfeExtractor::new().extract(&xml, "n.xml").unwrap_err();
        assert!(matches!(err, NfeError::MissingAccessKey));

        let err = NfeExtractor::new().extract("<root><a>1</a></root>", "n.xml").unwrap_err();
        assert!(matches!(err, NfeError::MissingAccessKey));
    }

    #[test]
    fn test_malformed_document() {
        let xml = invoice_xml(&item(1, "A"), "");
        let truncated = &xml[..xml.len() / 2];
        let err = NfeExtractor::new().extract(truncated, "n.xml").unwrap_err();
        assert!(matches!(err, NfeError::MalformedDocument(_)));
    }

    #[test]
    fn test_missing_body_is_parse_failure() {
        let xml = format!(
            "<procEventoNFe><evento><infEvento><chNFe>{KEY}</chNFe></infEvento></evento></procEventoNFe>"
        );
        let err = NfeExtractor::new().extract(&xml, "evento.xml").unwrap_err();
        match err {
            NfeError::ParseFailure { message, source } => {
                assert!(message.contains("evento.xml"));
                assert!(matches!(source, ExtractionError::MissingSection("infNFe")));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_header_or_seller_is_parse_failure() {
        let cases = [
            (
                "emit",
                format!(r#"<NFe><infNFe Id="NFe{KEY}"><ide><nNF>7</nNF></ide></infNFe></NFe>"#),
            ),
            (
                "ide",
                format!(r#"<NFe><infNFe Id="NFe{KEY}"><emit><xNome>Loja</xNome></emit></infNFe></NFe>"#),
            ),
        ];

        for (section, xml) in cases {
            let err = NfeExtractor::new().extract(&xml, "n.xml").unwrap_err();
            assert_eq!(err.kind(), "parse_failure");
            match err {
                NfeError::ParseFailure { source, .. } => {
                    assert!(
                        matches!(source, ExtractionError::MissingSection(name) if name == section),
                        "expected missing <{}>, got {:?}",
                        section,
                        source
                    );
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn test_optional_sections_default() {
        let xml = format!(
            r#"<NFe><infNFe Id="NFe{KEY}"><ide><nNF>7</nNF></ide><emit><xNome>Loja</xNome></emit></infNFe></NFe>"#
        );
        let invoice = NfeExtractor::new().extract(&xml, "n.xml").unwrap();
        assert_eq!(invoice.buyer, Party::default());
        assert!(invoice.line_items.is_empty());
        assert_eq!(invoice.total_value, Decimal::ZERO);
        assert_eq!(invoice.order_reference, None);
        assert!(invoice.seller.address.is_empty());
    }

    #[test]
    fn test_order_reference_from_annotations() {
        let extra = r#"<infAdic>
            <infAdFisco>Documento emitido por ME</infAdFisco>
            <infCpl>PEDIDO 4455 / DT: 98765 ENTREGA AGENDADA</infCpl>
            <obsCont xCampo="pedido"><xTexto>OC 771</xTexto></obsCont>
        </infAdic>"#;
        let xml = invoice_xml(&item(1, "A"), extra);

        let extractor = NfeExtractor::new().with_supplier_configs(vec![
            SupplierExtractionConfig::new("", "Padrão", "obsCont", r"OC\s*(\d+)"),
            SupplierExtractionConfig::new("11222333000181", "Distribuidora Sul", "infCpl", r"DT:?\s*(\d+)"),
        ]);
        let invoice = extractor.extract(&xml, "n.xml").unwrap();
        assert_eq!(invoice.order_reference.as_deref(), Some("98765"));

        let extractor = NfeExtractor::new().with_supplier_configs(vec![
            SupplierExtractionConfig::new("", "Padrão", "obsCont", r"OC\s*(\d+)"),
        ]);
        let invoice = extractor.extract(&xml, "n.xml").unwrap();
        assert_eq!(invoice.order_reference.as_deref(), Some("771"));
    }

    #[test]
    fn test_annotation_fields_collected() {
        let extra = r#"<compra><xPed>PO-1</xPed></compra>
            <infAdic><infCpl>a</infCpl><obsCont><xTexto>x</xTexto></obsCont><obsCont><xTexto>y</xTexto></obsCont></infAdic>"#;
        let xml = invoice_xml(&item(1, "A"), extra);
        let doc = XmlDocument::parse(&xml).unwrap();
        let reader = TagReader::new(&doc);
        let inf = reader.find("infNFe", None).unwrap();

        let notes = read_annotations(&reader, inf);
        assert_eq!(notes.get(fields::BUYER_ORDER), Some("PO-1"));
        assert_eq!(notes.get(fields::COMPLEMENTARY_INFO), Some("a"));
        assert_eq!(notes.get(fields::OBSERVATION), Some("x\ny"));
        assert_eq!(notes.get(fields::ADDITIONAL_INFO), Some("axy"));
        assert_eq!(notes.get(fields::FISCAL_NOTES), None);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let xml = invoice_xml(&item(1, "A"), "");
        let extractor = NfeExtractor::new();
        let first = extractor.extract(&xml, "n.xml").unwrap();
        let second = extractor.extract(&xml, "n.xml").unwrap();
        assert!(first.same_content(&second));
    }

    #[test]
    fn test_placeholder_barcode_kept_when_configured() {
        let config = ExtractionConfig {
            drop_placeholder_barcodes: false,
            ..ExtractionConfig::default()
        };
        let invoice = NfeExtractor::new()
            .with_config(&config)
            .extract(&invoice_xml(&item(1, "A"), ""), "n.xml")
            .unwrap();
        assert_eq!(invoice.line_items[0].box_barcode.as_deref(), Some("SEM GTIN"));
    }

    #[test]
    fn test_report_has_no_warnings_for_valid_invoice() {
        let items = format!("{}{}", item(1, "A"), item(2, "B"));
        let report = NfeExtractor::new()
            .extract_report(&invoice_xml(&items, ""), "n.xml")
            .unwrap();
        assert_eq!(report.warnings, Vec::<String>::new());
    }
}
