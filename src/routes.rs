use crate::{
    api::{attendance, employee},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let burst = requests_per_min.max(1);
    let per_ms = (60_000 / burst as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(burst)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("non-zero period and burst always build a limiter");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let clock_limiter = Arc::new(build_limiter(config.rate_clock_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let query_limiter = Arc::new(build_limiter(config.rate_query_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            // /employees
            .service(
                web::resource("/employees")
                    .wrap(register_limiter)
                    .route(web::post().to(employee::register_employee)),
            )
            .service(
                web::scope("/attendance")
                    // /attendance/clock-in
                    .service(
                        web::resource("/clock-in")
                            .wrap(clock_limiter.clone())
                            .route(web::post().to(attendance::clock_in)),
                    )
                    // /attendance/clock-out
                    .service(
                        web::resource("/clock-out")
                            .wrap(clock_limiter)
                            .route(web::post().to(attendance::clock_out)),
                    )
                    // /attendance/totals/by-name/{name}
                    .service(
                        web::resource("/totals/by-name/{name}")
                            .wrap(query_limiter.clone())
                            .route(web::get().to(attendance::totals_by_name)),
                    )
                    // /attendance/totals/{card_uid}
                    .service(
                        web::resource("/totals/{card_uid}")
                            .wrap(query_limiter)
                            .route(web::get().to(attendance::totals_by_card)),
                    ),
            ),
    );
}
