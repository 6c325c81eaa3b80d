use opml::{Outline, OPML};

use crate::error::{AppError, Result};

/// Every `xmlUrl` in the document, nested outlines included.
pub fn parse_opml_sources(content: &str) -> Result<Vec<String>> {
    let opml = OPML::from_str(content).map_err(|e| AppError::OpmlParse(e.to_string()))?;

    let mut sources = Vec::new();
    collect_sources(&opml.body.outlines, &mut sources);

    Ok(sources)
}

fn collect_sources(outlines: &[Outline], sources: &mut Vec<String>) {
    for outline in outlines {
        if let Some(xml_url) = outline.xml_url.as_deref().map(str::trim) {
            if !xml_url.is_empty() {
                sources.push(xml_url.to_string());
            }
        }

        // Categories/folders
        if !outline.outlines.is_empty() {
            collect_sources(&outline.outlines, sources);
        }
    }
}
