use crate::gesture::PopupContent;
use crate::session::Session;

pub const PREDICTION_FAILED_MESSAGE: &str = "Prediction failed. Please check the API.";
pub const NOTHING_CAPTURED_MESSAGE: &str = "Take a picture first.";
pub const INVALID_IMAGE_MESSAGE: &str = "That capture could not be read as an image. Try again.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session expired. Take the picture again.";

/// One-shot message rendered above the camera form.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Error(&'static str),
}

/// Everything the page needs from a session, copied out so rendering runs
/// without the store lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageView {
    pub has_capture: bool,
    pub capture_version: u64,
    pub popup: Option<PopupContent>,
    pub notice: Option<Notice>,
}

impl PageView {
    pub fn from_session(session: &Session, notice: Option<Notice>) -> Self {
        let popup = session
            .show_popup()
            .then(|| PopupContent::from_label(session.prediction_label()));
        Self {
            has_capture: session.captured_image().is_some(),
            capture_version: session.capture_version(),
            popup,
            notice,
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const STYLE: &str = r#"
<style>
body { font-family: "Source Sans Pro", sans-serif; max-width: 760px; margin: 0 auto; padding: 2rem 1rem; color: #31333f; }
hr { border: none; border-top: 1px solid #e6e6e6; margin: 1.5rem 0; }
@keyframes gentle-bounce { 0%, 100% { transform: translateY(0); } 50% { transform: translateY(-6px); } }
.bouncy-card { animation: gentle-bounce 2s ease-in-out infinite; background-color: #fffdf8; padding: 25px; margin: 15px 0 40px; border-radius: 12px; box-shadow: 0 4px 10px rgba(249,115,22,0.15); }
.bouncy-card p { font-size: 18px; margin-bottom: 8px; }
.camera-form, .predict-form { margin: 1rem 0; }
.captured figure { margin: 0; }
.captured figcaption { color: #888; font-size: 14px; }
.primary-btn { background-color: #ff4b4b; border: none; color: #fff; font-size: 16px; border-radius: 8px; padding: 8px 18px; cursor: pointer; }
.error { background-color: #ffe4e4; color: #7d1a1a; padding: 12px 16px; border-radius: 8px; }
.spinner { display: none; margin-top: 12px; color: #f97316; }
.predict-form.busy .spinner { display: block; }
.predict-form.busy button { opacity: 0.5; pointer-events: none; }
.popup-overlay { position: fixed; top: 0; left: 0; right: 0; bottom: 0; background-color: rgba(0,0,0,0.4); z-index: 1001; display: flex; justify-content: center; align-items: center; }
.popup-box { background-color: #fff; padding: 40px; border-radius: 20px; text-align: center; box-shadow: 0px 8px 20px rgba(0,0,0,0.3); animation: fadeIn 0.5s ease-in-out; }
.emoji-animated { font-size: 100px; animation: bounce 1.2s infinite; }
.close-btn { margin-top: 20px; background-color: #FFE4C4; border: none; color: #F97316; font-size: 16px; font-weight: bold; border-radius: 10px; padding: 10px 20px; cursor: pointer; }
@keyframes bounce { 0%, 100% { transform: translateY(0); } 50% { transform: translateY(-15px); } }
@keyframes fadeIn { from { opacity: 0; } to { opacity: 1; } }
footer p { text-align: center; color: #888; }
</style>
"#;

const CHALLENGE_CARD: &str = r#"
<h3>Can your webcam handle the challenge? 📸</h3>
<div class="bouncy-card">
  <p>🎬 <strong>Ready to go live?</strong> Let's test your reflexes.</p>
  <p>✋ Hold up a gesture to your webcam.</p>
  <p>🧠 Watch closely... the AI is analyzing your move.</p>
  <p><strong>✨ Let's see if it nails the prediction!</strong></p>
</div>
"#;

const CAMERA_FORM: &str = r#"
<form class="camera-form" action="/capture" method="post" enctype="multipart/form-data">
  <label for="image">Take a picture</label><br>
  <input id="image" name="image" type="file" accept="image/*" capture="user" onchange="this.form.submit()" required>
  <noscript><button class="primary-btn" type="submit">Use this picture</button></noscript>
</form>
"#;

const FOOTER: &str = r#"
<hr>
<footer><p>Crafted with ❤️ and 🤖 to Bring Hand Gestures to Life ©️ 2025</p></footer>
"#;

pub fn render(view: &PageView) -> String {
    let mut html = String::with_capacity(8 * 1024);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str("<title>Camera Input</title>\n");
    html.push_str("<link rel=\"icon\" href=\"data:image/svg+xml,<svg xmlns=%22http://www.w3.org/2000/svg%22 viewBox=%220 0 100 100%22><text y=%22.9em%22 font-size=%2290%22>📷</text></svg>\">\n");
    html.push_str(STYLE);
    html.push_str("</head>\n<body>\n");
    html.push_str("<h1>📷 Take a Gesture Snapshot</h1>\n<hr>\n");
    html.push_str(CHALLENGE_CARD);

    if let Some(Notice::Error(message)) = &view.notice {
        html.push_str(&format!(
            "<div class=\"error\" role=\"alert\">{}</div>\n",
            escape_html(message)
        ));
    }

    html.push_str(CAMERA_FORM);

    if view.has_capture {
        html.push_str(&format!(
            r#"
<section class="captured">
  <figure>
    <img src="/captured.jpg?v={}" alt="Captured Image" width="400">
    <figcaption>Captured Image</figcaption>
  </figure>
  <form class="predict-form" action="/predict" method="post" onsubmit="this.classList.add('busy')">
    <button class="primary-btn" type="submit">✨ Predict Gesture</button>
    <div class="spinner">🔮 Analyzing your gesture...</div>
  </form>
</section>
"#,
            view.capture_version
        ));
    }

    if let Some(popup) = &view.popup {
        html.push_str(&format!(
            r#"
<div class="popup-overlay">
  <div class="popup-box">
    <div class="emoji-animated">{}</div>
    <p style="font-size: 24px; margin-top: 10px;">Wow! You got <strong style="color:#f97316">{}</strong></p>
    <form action="/dismiss" method="post">
      <button class="close-btn" type="submit">spin the wheel again!</button>
    </form>
  </div>
</div>
"#,
            popup.emoji,
            escape_html(&popup.title)
        ));
    }

    html.push_str(FOOTER);
    html.push_str("</body>\n</html>\n");
    html
}
