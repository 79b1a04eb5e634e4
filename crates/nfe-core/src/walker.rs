//! Schema-free walk over every leaf element of an XML document.
//!
//! Used by tag discovery tooling when writing supplier configs: it shows
//! which paths carry text without knowing anything about NF-e.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::Result;
use crate::models::tag::{TagSummary, XmlTagRecord};
use crate::xml::{ElementTree, NodeId, XmlDocument};

/// Walk `xml_text` depth-first and list every leaf element with text.
///
/// Records come out in document order. Container elements and empty leaves
/// are traversed but not recorded. Only unparseable input fails.
pub fn walk(xml_text: &str) -> Result<Vec<XmlTagRecord>> {
    let doc = XmlDocument::parse(xml_text)?;
    let records = walk_document(&doc);
    debug!("Walked {} leaf records", records.len());
    Ok(records)
}

/// Walk an already parsed document.
///
/// Iterative, so nesting depth is bounded by memory rather than the call stack.
pub fn walk_document(doc: &XmlDocument) -> Vec<XmlTagRecord> {
    let mut records = Vec::new();
    // Tag names from the root down to the element being visited.
    let mut trail: Vec<&str> = Vec::new();
    let mut pending: Vec<(NodeId, usize)> = vec![(doc.root(), 0)];

    while let Some((id, depth)) = pending.pop() {
        let tag_name = doc.tag_name(id);
        trail.truncate(depth);
        trail.push(tag_name);

        if doc.is_leaf(id) {
            if let Some(record) = leaf_record(doc, id, &trail) {
                records.push(record);
            }
            continue;
        }

        let before = pending.len();
        pending.extend(doc.children(id).map(|child| (child, depth + 1)));
        pending[before..].reverse();
    }

    records
}

fn leaf_record(doc: &XmlDocument, id: NodeId, trail: &[&str]) -> Option<XmlTagRecord> {
    let content = doc.text_content(id);
    let content = content.trim();
    if content.is_empty() {
        return None;
    }

    let attributes: BTreeMap<String, String> = doc.attributes(id).iter().cloned().collect();
    Some(XmlTagRecord {
        tag_name: doc.tag_name(id).to_string(),
        content: content.to_string(),
        attributes: if attributes.is_empty() { None } else { Some(attributes) },
        path: trail.join("/"),
    })
}

/// Group records by path, keeping first-seen order.
pub fn summarize_tags(records: &[XmlTagRecord]) -> Vec<TagSummary> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut summaries: Vec<TagSummary> = Vec::new();

    for record in records {
        match index.get(record.path.as_str()) {
            Some(&i) => summaries[i].occurrences += 1,
            None => {
                index.insert(&record.path, summaries.len());
                summaries.push(TagSummary {
                    path: record.path.clone(),
                    tag_name: record.tag_name.clone(),
                    occurrences: 1,
                    sample: record.content.clone(),
                });
            }
        }
    }

    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NfeError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_only_leaves_with_text_are_recorded() {
        let records = walk(r#"<a><b>text1</b><c attr="v"/></a>"#).unwrap();
        assert_eq!(
            records,
            vec![XmlTagRecord {
                tag_name: "b".to_string(),
                content: "text1".to_string(),
                attributes: None,
                path: "a/b".to_string(),
            }]
        );
    }

    #[test]
    fn test_paths_attributes_and_order() {
        let xml = r#"<nfeProc versao="4.00">
            <NFe><infNFe Id="NFe1">
                <det nItem="1"><prod><cProd>A</cProd><qCom unit="CX"> 2 </qCom></prod></det>
                <det nItem="2"><prod><cProd>B</cProd></prod></det>
            </infNFe></NFe>
        </nfeProc>"#;
        let records = walk(xml).unwrap();

        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "nfeProc/NFe/infNFe/det/prod/cProd",
                "nfeProc/NFe/infNFe/det/prod/qCom",
                "nfeProc/NFe/infNFe/det/prod/cProd",
            ]
        );
        assert_eq!(records[1].content, "2");
        assert_eq!(
            records[1].attributes.as_ref().and_then(|a| a.get("unit")).map(String::as_str),
            Some("CX")
        );
    }

    #[test]
    fn test_root_leaf_is_recorded_with_own_path() {
        let records = walk("<note>hello</note>").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "note");
    }

    #[test]
    fn test_prefixed_tag_names_are_kept() {
        let records = walk(r#"<x:a xmlns:x="urn:x"><x:b>1</x:b></x:a>"#).unwrap();
        assert_eq!(records[0].path, "x:a/x:b");
        assert_eq!(records[0].tag_name, "x:b");
    }

    #[test]
    fn test_deeply_nested_document() {
        let depth = 50_000;
        let xml = format!("{}x{}", "<a>".repeat(depth), "</a>".repeat(depth));
        let records = walk(&xml).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "x");
        assert_eq!(records[0].path.split('/').count(), depth);
    }

    #[test]
    fn test_siblings_after_nested_branch() {
        let records = walk("<r><a><b><c>1</c></b><d>2</d></a><e>3</e></r>").unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["r/a/b/c", "r/a/d", "r/e"]);
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(walk("<a><b>"), Err(NfeError::MalformedDocument(_))));
        assert!(matches!(walk("<a></b>"), Err(NfeError::MalformedDocument(_))));
    }

    #[test]
    fn test_summarize_tags() {
        let records = walk("<a><b>1</b><b>2</b><c>3</c></a>").unwrap();
        let summary = summarize_tags(&records);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].path, "a/b");
        assert_eq!(summary[0].occurrences, 2);
        assert_eq!(summary[0].sample, "1");
        assert_eq!(summary[1].path, "a/c");
    }
}
