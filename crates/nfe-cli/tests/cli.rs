use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const KEY: &str = "35240111222333000181550010000012341000012349";

fn invoice_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe Id="NFe{KEY}" versao="4.00">
      <ide><nNF>1234</nNF><serie>1</serie><dhEmi>2024-01-15T10:30:00-03:00</dhEmi></ide>
      <emit><CNPJ>11222333000181</CNPJ><xNome>Distribuidora Sul Ltda</xNome></emit>
      <dest><CPF>52998224725</CPF><xNome>Maria Souza</xNome></dest>
      <det nItem="1"><prod>
        <cProd>FAR-01</cProd><cEAN>SEM GTIN</cEAN><xProd>Farinha</xProd><uCom>CX</uCom>
        <qCom>2</qCom><vUnCom>25.00</vUnCom><vProd>50.00</vProd>
      </prod></det>
      <total><ICMSTot><vNF>50.00</vNF></ICMSTot></total>
      <infAdic><infCpl>Pedido 4455 DT 98765</infCpl></infAdic>
    </infNFe>
  </NFe>
  <protNFe><infProt><chNFe>{KEY}</chNFe></infProt></protNFe>
</nfeProc>"#
    )
}

fn nfe() -> Command {
    Command::cargo_bin("nfe").unwrap()
}

fn write_suppliers(path: &Path) {
    fs::write(
        path,
        r#"[
  {"tax_id": "", "supplier_name": "Padrão", "source_field": "infCpl", "extraction_pattern": "pedido\\s*(\\d+)"},
  {"tax_id": "11222333000181", "supplier_name": "Distribuidora Sul", "source_field": "infCpl", "extraction_pattern": "DT\\s*(\\d+)"}
]"#,
    )
    .unwrap();
}

#[test]
fn process_prints_invoice_json() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("nota.xml");
    let suppliers = dir.path().join("suppliers.json");
    fs::write(&input, invoice_xml()).unwrap();
    write_suppliers(&suppliers);

    nfe()
        .arg("process")
        .arg(&input)
        .arg("--suppliers")
        .arg(&suppliers)
        .assert()
        .success()
        .stdout(predicate::str::contains(KEY))
        .stdout(predicate::str::contains(r#""order_reference": "98765""#))
        .stdout(predicate::str::contains(r#""file_name": "nota.xml""#));
}

#[test]
fn process_rejects_malformed_xml() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("broken.xml");
    fs::write(&input, "<nfeProc><NFe>").unwrap();

    nfe()
        .arg("process")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed XML document"));
}

#[test]
fn process_text_format() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("nota.xml");
    fs::write(&input, invoice_xml()).unwrap();

    nfe()
        .args(["process", "-f", "text"])
        .arg(&input)
        .arg("--suppliers")
        .arg(dir.path().join("none.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("NF-e 1234 / series 1"))
        .stdout(predicate::str::contains("11.222.333/0001-81"))
        .stdout(predicate::str::contains("Issued: 15/01/2024 10:30"));
}

#[test]
fn batch_classifies_each_document() {
    let dir = tempdir().unwrap();
    let inbox = dir.path().join("inbox");
    let out = dir.path().join("out");
    fs::create_dir_all(&inbox).unwrap();
    fs::write(inbox.join("a.xml"), invoice_xml()).unwrap();
    fs::write(inbox.join("b.xml"), invoice_xml()).unwrap();
    fs::write(inbox.join("c.xml"), "<nfeProc><NFe>").unwrap();

    nfe()
        .arg("batch")
        .arg(format!("{}/*.xml", inbox.display()))
        .arg("-o")
        .arg(&out)
        .arg("--summary")
        .arg("--suppliers")
        .arg(dir.path().join("none.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1 imported, 1 duplicate, 1 failed"));

    assert!(out.join(format!("{}.json", KEY)).exists());

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert!(summary.contains(&format!("a.xml,imported,{}", KEY)));
    assert!(summary.contains(&format!("b.xml,duplicate,{}", KEY)));
    assert!(summary.contains("c.xml,error"));

    // A second run finds the stored record.
    fs::remove_file(inbox.join("c.xml")).unwrap();
    fs::remove_file(inbox.join("b.xml")).unwrap();
    nfe()
        .arg("batch")
        .arg(format!("{}/*.xml", inbox.display()))
        .arg("-o")
        .arg(&out)
        .arg("--suppliers")
        .arg(dir.path().join("none.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("0 imported, 1 duplicate, 0 failed"));
}

#[test]
fn batch_fail_fast_stops_on_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.xml"), "<nfeProc><NFe>").unwrap();

    nfe()
        .arg("batch")
        .arg(format!("{}/*.xml", dir.path().display()))
        .arg("--fail-fast")
        .arg("--suppliers")
        .arg(dir.path().join("none.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Processing failed"));
}

#[test]
fn tags_lists_leaf_paths() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("nota.xml");
    fs::write(&input, invoice_xml()).unwrap();

    nfe()
        .args(["tags", "-f", "json", "--filter", "infCpl"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("nfeProc/NFe/infNFe/infAdic/infCpl"))
        .stdout(predicate::str::contains("Pedido 4455 DT 98765"))
        .stdout(predicate::str::contains("xNome").not());
}

#[test]
fn suppliers_add_list_remove() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("suppliers.json");

    nfe()
        .args(["suppliers", "add", "--tax-id", "11.222.333/0001-81", "--name", "Distribuidora Sul"])
        .args(["--pattern", r"DT\s*(\d+)"])
        .arg("--file")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Added config for Distribuidora Sul"));

    nfe()
        .args(["suppliers", "list", "--json"])
        .arg("--file")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""tax_id": "11222333000181""#));

    nfe()
        .args(["suppliers", "add", "--name", "Padrão", "--field", "nope", "--pattern", "(x)"])
        .arg("--file")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown field"));

    nfe()
        .args(["suppliers", "remove", "11222333000181"])
        .arg("--file")
        .arg(&file)
        .assert()
        .success();

    nfe()
        .args(["suppliers", "list", "--json"])
        .arg("--file")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn suppliers_test_pattern() {
    nfe()
        .args(["suppliers", "test", r"pedido\s*(\d+)", "PEDIDO 771"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Match: 771"));

    nfe()
        .args(["suppliers", "test", r"pedido(\d+", "PEDIDO 771"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid pattern"));
}
