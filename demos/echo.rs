use anvil_web::{Context, Router, Server, ServerError, StatusCode};
use std::sync::Arc;

async fn echo(ctx: &mut Context<'_>) -> Result<(), ServerError> {
    let body = format!(
        r#"{{"path":{:?},"body":{:?}}}"#,
        ctx.request().path(),
        ctx.request().body().map(|b| String::from_utf8_lossy(b)).unwrap_or_default(),
    );
    ctx.json(StatusCode::Ok, body.into_bytes());
    Ok(())
}

#[tokio::main]
async fn main() {
    let mut router = Router::new();
    router.route(anvil_web::Method::Post, "/echo", Arc::new(|ctx: &mut Context<'_>| Box::pin(echo(ctx))));

    Server::builder().router(router).build().unwrap().launch().await;
}
