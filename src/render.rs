//! Server-side HTML for the upload page.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::detector::Diagnosis;
use crate::disease_info::DiseaseInfo;

/// What the page shows below the upload form.
pub enum Outcome<'a> {
    Idle,
    Diagnosed {
        preview: Option<String>,
        diagnosis: &'a Diagnosis,
    },
    Failed {
        preview: Option<String>,
        message: String,
    },
}

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; color: #1f2937;
  background: linear-gradient(to bottom right, #b7f3c6, #8fd19e, #62b67a); background-attachment: fixed; }
.layout { display: flex; min-height: 100vh; }
.sidebar { width: 260px; padding: 24px; background: rgba(232, 255, 237, 0.9); color: #064e3b; }
.sidebar .note { background: #dbeafe; color: #1e3a8a; padding: 10px; border-radius: 8px; }
.sidebar .caption { font-size: 13px; color: #4b5563; }
main { flex: 1; display: flex; flex-direction: column; align-items: center; padding: 32px 16px; }
.glass-box { background: rgba(255, 255, 255, 0.85); padding: 40px; border-radius: 15px; max-width: 720px; width: 100%;
  box-shadow: 0 4px 30px rgba(0, 0, 0, 0.1); backdrop-filter: blur(8px); }
.main-title { text-align: center; color: #166534; font-size: 40px; font-weight: bold; margin-top: 0; }
.subtext { text-align: center; color: #374151; font-size: 18px; margin-bottom: 20px; }
.notice { padding: 12px 16px; border-radius: 8px; margin: 16px 0; }
.notice.info { background: #dbeafe; color: #1e3a8a; }
.notice.success { background: #dcfce7; color: #14532d; }
.notice.error { background: #fee2e2; color: #7f1d1d; }
.preview { width: 100%; border-radius: 10px; }
.caption { text-align: center; font-size: 14px; color: #6b7280; }
.progress { background: #e5e7eb; border-radius: 6px; height: 10px; overflow: hidden; }
.progress > div { background-color: #22c55e; height: 100%; }
.info-card { background: rgba(240, 253, 244, 0.8); padding: 20px; border-left: 5px solid #16a34a;
  border-radius: 10px; margin-top: 15px; }
footer { text-align: center; color: #065f46; font-size: 14px; margin-top: 24px; }
"#;

const SIDEBAR: &str = r#"<aside class="sidebar">
  <h2>&#127793; About This Project</h2>
  <p>This web application identifies <b>plant leaf diseases</b> using a <b>MobileNetV2</b> deep learning model trained on the <b>PlantVillage Dataset</b>.</p>
  <p><b>Features:</b></p>
  <ul>
    <li>&#128248; Upload leaf images</li>
    <li>&#128269; AI-powered disease detection</li>
    <li>&#128202; Confidence score display</li>
    <li>&#128138; Detailed disease info and treatments</li>
  </ul>
  <p class="note">Model Accuracy: ~92.6%</p>
  <p class="caption">Powered by ONNX Runtime &#8226; Rust &#8226; Deep Learning</p>
</aside>"#;

const UPLOAD_FORM: &str = r#"<form method="POST" action="/" enctype="multipart/form-data">
  <label for="file">&#128228; Upload Leaf Image</label><br>
  <input type="file" id="file" name="file" accept=".jpg,.jpeg,.png,image/jpeg,image/png" required>
  <button type="submit">Detect</button>
</form>"#;

pub fn page(outcome: &Outcome<'_>) -> String {
    let body = match outcome {
        Outcome::Idle => r#"<div class="notice info">&#128229; Please upload a clear leaf image from your dataset to start detection.</div>"#
            .to_string(),
        Outcome::Diagnosed { preview, diagnosis } => {
            format!("{}<hr>{}", preview_html(preview.as_deref()), diagnosis_html(diagnosis))
        }
        Outcome::Failed { preview, message } => format!(
            r#"{}<div class="notice error">&#9888;&#65039; {}</div>"#,
            preview_html(preview.as_deref()),
            html_escape(message)
        ),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Plant Disease Detection</title>
<link rel="icon" href="data:image/svg+xml,<svg xmlns=%22http://www.w3.org/2000/svg%22 viewBox=%220 0 100 100%22><text y=%22.9em%22 font-size=%2290%22>&#127807;</text></svg>">
<style>{STYLE}</style>
</head>
<body>
<div class="layout">
{SIDEBAR}
<main>
<div class="glass-box">
  <h1 class="main-title">&#127807; Plant Disease Detection System</h1>
  <p class="subtext">Upload a leaf image to identify possible plant diseases instantly using AI.</p>
  {UPLOAD_FORM}
  {body}
</div>
<footer><hr>&copy; 2025 | Deep Learning Based Plant Disease Detection &#127807;</footer>
</main>
</div>
</body>
</html>"#
    )
}

fn preview_html(preview: Option<&str>) -> String {
    match preview {
        Some(src) => format!(
            r#"<img class="preview" src="{}" alt="Uploaded leaf"><p class="caption">&#128444;&#65039; Uploaded Image</p>"#,
            html_escape(src)
        ),
        None => String::new(),
    }
}

fn diagnosis_html(diagnosis: &Diagnosis) -> String {
    let prediction = &diagnosis.prediction;
    let result = format!(
        r#"<div class="notice success">&#127793; <b>Predicted Disease:</b> {label}</div>
<div class="progress"><div style="width:{progress}%"></div></div>
<p><b>Confidence:</b> {confidence:.2}%</p>"#,
        label = html_escape(&prediction.label),
        progress = prediction.progress_percent(),
        confidence = prediction.confidence_percent,
    );

    let card = match diagnosis.info {
        Some(info) => info_card_html(info),
        None => r#"<div class="notice info">No detailed information available for this disease class.</div>"#
            .to_string(),
    };

    format!("{result}\n{card}")
}

fn info_card_html(info: &DiseaseInfo) -> String {
    format!(
        r#"<hr>
<h3>&#129516; Disease Information Card</h3>
<div class="info-card">
<b>&#129707; Cause:</b> {}<br><br>
<b>&#9877;&#65039; Symptoms:</b> {}<br><br>
<b>&#128138; Treatment:</b> {}
</div>"#,
        emphasize(info.cause),
        emphasize(info.symptoms),
        emphasize(info.treatment)
    )
}

/// `data:` URI for showing the upload back to the user.
pub fn data_uri(bytes: &[u8]) -> Option<String> {
    let format = image::guess_format(bytes).ok()?;
    Some(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        STANDARD.encode(bytes)
    ))
}

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes `s` and turns balanced `*text*` spans into `<em>text</em>`.
pub fn emphasize(s: &str) -> String {
    let escaped = html_escape(s);
    let parts: Vec<&str> = escaped.split('*').collect();
    // Odd part count means every `*` has a partner.
    if parts.len() % 2 == 0 {
        return escaped;
    }
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            if i % 2 == 1 {
                format!("<em>{part}</em>")
            } else {
                part.to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disease_info;
    use crate::labels::ClassLabels;
    use crate::prediction::Prediction;

    fn diagnosis(label_json: &str, probs: Vec<f32>) -> Diagnosis {
        let labels = ClassLabels::from_json_str(label_json).unwrap();
        let prediction = Prediction::from_probabilities(probs, &labels).unwrap();
        let info = disease_info::lookup(&prediction.label);
        Diagnosis {
            prediction,
            info,
            model_version: "test".to_string(),
        }
    }

    #[test]
    fn idle_page_prompts_for_upload() {
        let html = page(&Outcome::Idle);
        assert!(html.contains("Plant Disease Detection System"));
        assert!(html.contains(r#"name="file""#));
        assert!(html.contains("Please upload a clear leaf image"));
        assert!(html.contains("Model Accuracy: ~92.6%"));
    }

    #[test]
    fn result_page_shows_label_confidence_and_card() {
        let d = diagnosis(
            r#"{ "Potato___Early_blight": 0, "Potato___healthy": 1 }"#,
            vec![0.87654, 0.12346],
        );
        let html = page(&Outcome::Diagnosed {
            preview: Some("data:image/png;base64,AAAA".to_string()),
            diagnosis: &d,
        });

        assert!(html.contains("<b>Predicted Disease:</b> Potato___Early_blight"));
        assert!(html.contains("<b>Confidence:</b> 87.65%"));
        assert!(html.contains(r#"style="width:87%""#));
        assert!(html.contains("Disease Information Card"));
        assert!(html.contains("Fungus <em>Alternaria solani</em>"));
        assert!(html.contains(r#"src="data:image/png;base64,AAAA""#));
        assert!(!html.contains("Please upload a clear leaf image"));
    }

    #[test]
    fn unknown_class_gets_notice_instead_of_card() {
        let d = diagnosis(r#"{ "Corn___Common_rust": 0 }"#, vec![1.0]);
        let html = page(&Outcome::Diagnosed {
            preview: None,
            diagnosis: &d,
        });
        assert!(html.contains("No detailed information available for this disease class."));
        assert!(!html.contains("info-card\">"));
    }

    #[test]
    fn failure_message_is_escaped() {
        let html = page(&Outcome::Failed {
            preview: None,
            message: "<script>alert(1)</script>".to_string(),
        });
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>alert"));
    }

    #[test]
    fn emphasis_only_for_balanced_markers() {
        assert_eq!(emphasize("Fungus *A. solani*"), "Fungus <em>A. solani</em>");
        assert_eq!(emphasize("2 * 3"), "2 * 3");
        assert_eq!(emphasize("<b>"), "&lt;b&gt;");
    }

    #[test]
    fn data_uri_carries_detected_mime() {
        let png = crate::detector::tests::encode(image::ImageFormat::Png);
        let uri = data_uri(&png).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(data_uri(b"plain text"), None);
    }
}
