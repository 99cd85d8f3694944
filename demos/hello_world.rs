use anvil_web::{Context, Router, Server, ServerError, StatusCode};
use std::sync::Arc;

async fn hello(ctx: &mut Context<'_>) -> Result<(), ServerError> {
    ctx.text(StatusCode::Ok, b"Hello, world!".to_vec());
    Ok(())
}

#[tokio::main]
async fn main() {
    let mut router = Router::new();
    router.get("/", Arc::new(|ctx: &mut Context<'_>| Box::pin(hello(ctx))));

    Server::builder().router(router).build().unwrap().launch().await;
}
