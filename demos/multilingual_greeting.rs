use anvil_web::{Context, Router, Server, ServerError, StatusCode};
use std::sync::Arc;

async fn greeting(ctx: &mut Context<'_>) -> Result<(), ServerError> {
    let text = match ctx.param("lang") {
        Some("en") => Some(r#"{"lang":"en","text":"Hello, world!"}"#),
        Some("zh") => Some(r#"{"lang":"zh","text":"你好世界！"}"#),
        Some("es") => Some(r#"{"lang":"es","text":"¡Hola Mundo!"}"#),
        Some("ar") => Some(r#"{"lang":"ar","text":"مرحبا بالعالم!"}"#),
        Some("pt") => Some(r#"{"lang":"pt","text":"Olá, mundo!"}"#),
        Some("hi") => Some(r#"{"lang":"hi","text":"हैलो वर्ल्ड!"}"#),
        Some("ru") => Some(r#"{"lang":"ru","text":"Привет, мир!"}"#),
        _ => None,
    };

    match text {
        Some(text) => ctx.json(StatusCode::Ok, text.as_bytes().to_vec()),
        None => ctx.json(
            StatusCode::NotFound,
            br#"{"error":"Language not supported","status":"Not Found"}"#.to_vec(),
        ),
    };
    Ok(())
}

async fn supported(ctx: &mut Context<'_>) -> Result<(), ServerError> {
    ctx.json(StatusCode::Ok, br#"{"supported_lang":["en","zh","es","ar","pt","hi","ru"]}"#.to_vec());
    Ok(())
}

#[tokio::main]
async fn main() {
    let mut router = Router::new();
    router.get("/api", Arc::new(|ctx: &mut Context<'_>| Box::pin(supported(ctx))));
    router.get("/api/:lang", Arc::new(|ctx: &mut Context<'_>| Box::pin(greeting(ctx))));

    Server::builder().router(router).build().unwrap().launch().await;
}
