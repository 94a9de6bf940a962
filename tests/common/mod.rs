//! Hand-built PDFs for integration tests.
//!
//! Bodies are written object by object and the xref table is computed from
//! the real byte offsets, so both lopdf and pdf-extract can parse them.

#![allow(dead_code)]

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// One-page PDF with `lines` of Helvetica text and one URI link annotation
/// per entry of `annot_uris`.
pub fn pdf_with(lines: &[&str], annot_uris: &[&str]) -> Vec<u8> {
    let mut content = String::new();
    for (i, line) in lines.iter().enumerate() {
        content.push_str(&format!(
            "BT /F1 12 Tf 72 {} Td ({}) Tj ET\n",
            700 - (i as i32) * 36,
            escape(line)
        ));
    }

    let annot_refs: Vec<String> = (0..annot_uris.len())
        .map(|i| format!("{} 0 R", 6 + i))
        .collect();

    let mut objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
             /Resources << /Font << /F1 5 0 R >> >> /Annots [{}] >>",
            annot_refs.join(" ")
        ),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
    ];
    for (i, uri) in annot_uris.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Annot /Subtype /Link /Rect [72 {} 300 {}] /A << /S /URI /URI ({}) >> >>",
            100 + i * 20,
            115 + i * 20,
            escape(uri)
        ));
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}
