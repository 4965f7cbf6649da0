//! Plain-text rendering of an analysis result for the terminal.

use std::fmt::Write;

use crate::analysis::AnalysisResult;

/// Formats a score card: the score, then either the sections or the
/// narrative followed by numbered tips.
pub fn format_report(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Score: {}/100", result.score);
    if let Some(filename) = &result.filename {
        let _ = writeln!(out, "File:  {filename}");
    }

    if result.has_sections() {
        for section in &result.sections {
            let _ = writeln!(out);
            match section.score {
                Some(score) => {
                    let _ = writeln!(out, "{} ({score}/100)", section.title);
                }
                None => {
                    let _ = writeln!(out, "{}", section.title);
                }
            }
            for item in &section.items {
                let _ = writeln!(out, "  - {item}");
            }
        }
        return out;
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", result.narrative.trim());
    if !result.tips.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Tips:");
        for (index, tip) in result.tips.iter().enumerate() {
            let _ = writeln!(out, "  {}. {tip}", index + 1);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisSection;

    #[test]
    fn test_flat_report() {
        let report = format_report(&AnalysisResult {
            score: 71,
            narrative: "Good energy.\n".to_string(),
            tips: vec!["Breathe".to_string(), "Smile".to_string()],
            sections: Vec::new(),
            filename: None,
        });
        assert_eq!(
            report,
            "Score: 71/100\n\nGood energy.\n\nTips:\n  1. Breathe\n  2. Smile\n"
        );
    }

    #[test]
    fn test_sections_replace_narrative() {
        let report = format_report(&AnalysisResult {
            score: 50,
            narrative: "ignored".to_string(),
            tips: vec!["ignored".to_string()],
            sections: vec![AnalysisSection {
                title: "Clarity".to_string(),
                score: Some(40),
                items: vec!["Mumbled ending".to_string()],
            }],
            filename: Some("talk.ogg".to_string()),
        });
        assert!(report.contains("File:  talk.ogg"));
        assert!(report.contains("Clarity (40/100)\n  - Mumbled ending"));
        assert!(!report.contains("ignored"));
    }
}
