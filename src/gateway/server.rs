use super::App;
use super::session;
use actix_cors::Cors;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web::Responder;
use actix_web::middleware::Logger;
use actix_web::web;

pub struct Server;

impl Server {
    pub async fn run(app: App) -> Result<(), std::io::Error> {
        let bind = app.settings.bind_addr.clone();
        let state = web::Data::new(app);
        log::info!("starting session gateway on {}", bind);
        HttpServer::new(move || {
            actix_web::App::new()
                .wrap(Logger::new("%r %s %Ts"))
                .wrap(
                    Cors::default()
                        .allow_any_origin()
                        .allow_any_method()
                        .allow_any_header(),
                )
                .app_data(state.clone())
                .route("/ws", web::get().to(connect))
                .route("/healthz", web::get().to(healthz))
                .route("/readyz", web::get().to(readyz))
        })
        .workers(4)
        .bind(bind)?
        .run()
        .await
    }
}

async fn connect(
    app: web::Data<App>,
    req: HttpRequest,
    body: web::Payload,
) -> impl Responder {
    match actix_ws::handle(&req, body) {
        Ok((response, ws, stream)) => {
            actix_web::rt::spawn(session::run(app.into_inner(), ws, stream));
            response
        }
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

async fn healthz() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Ready iff every `required` dependency answers its ping in time.
async fn readyz(app: web::Data<App>) -> impl Responder {
    let report = app.deps.report().await;
    match app.deps.ready().await {
        true => HttpResponse::Ok().json(report),
        false => HttpResponse::ServiceUnavailable().json(report),
    }
}
