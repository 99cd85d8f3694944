use anvil_web::{Context, Router, Server, ServerError, StatusCode};
use std::sync::Arc;

async fn inspect(ctx: &mut Context<'_>) -> Result<(), ServerError> {
    let user_agent = ctx
        .request()
        .header("user-agent")
        .map(|value| format!(r#", "user_agent": {value:?}"#))
        .unwrap_or_default();

    let content_type = ctx
        .request()
        .header("content-type")
        .map(|value| format!(r#", "content_type": {value:?}"#))
        .unwrap_or_default();

    let body = ctx.request().body().map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default();

    let result = format!(
        r#"{{"method": "{}", "path": {:?}{user_agent}{content_type}, "body": {body:?}}}"#,
        ctx.request().method(),
        ctx.request().path(),
    );

    ctx.json(StatusCode::Ok, result.into_bytes());
    Ok(())
}

#[tokio::main]
async fn main() {
    let mut router = Router::new();
    router.get("/", Arc::new(|ctx: &mut Context<'_>| Box::pin(inspect(ctx))));

    Server::builder().router(router).build().unwrap().launch().await;
}
