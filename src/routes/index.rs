use axum::response::Html;

const UPLOAD_FORM: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Audio to Video</title>
  <style>
    body { font-family: sans-serif; max-width: 32rem; margin: 4rem auto; color: #222; }
    fieldset { border: 1px solid #ccc; padding: 1rem; }
    label { display: block; margin: 0.5rem 0; }
    button { margin-top: 1rem; }
  </style>
</head>
<body>
  <h1>Audio to Video</h1>
  <form action="/convert" method="post" enctype="multipart/form-data">
    <fieldset>
      <label>Audio file <input type="file" name="audio" accept="audio/*" required></label>
      <label>Background
        <select name="background">
          <option value="">Server default</option>
          <option value="color">Solid color</option>
          <option value="image">Static image</option>
        </select>
      </label>
      <button type="submit">Convert</button>
    </fieldset>
  </form>
</body>
</html>
"#;

pub async fn upload_form() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}
