//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into the engine. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here awaits the engine's async API, so database work
//! never blocks a worker.
//!
//! Customer routes are mounted under `/customer` and store routes under `/store`. Both scopes sit behind the bearer
//! token middleware, and each route states the role it requires.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use marketplace_engine::{
    db_types::{Actor, ActorRole},
    helpers::EventVerifier,
    traits::{OrderManagement, PaymentReconciliation, ReviewManagement},
    OrderStatusApi,
    ReviewApi,
    WebhookApi,
};

use crate::{
    auth::JwtClaims,
    data_objects::{CustomerStatusUpdate, NewReviewRequest, ReviewReplyRequest, StoreStatusUpdate, WebhookAck},
    errors::{AuthError, ServerError},
};

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:expr),*]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(stripe_webhook => Post "/webhooks/stripe" impl PaymentReconciliation, EventVerifier);
/// Route handler for payment gateway webhooks
///
/// The raw body is handed to the engine untouched, since the signature in the `Stripe-Signature` header covers the
/// exact bytes that were sent.
///
/// Every verified delivery is acknowledged with a 200, whether or not it changed anything, so that the gateway stops
/// retrying it. Deliveries that fail verification get a 400. Storage failures get a 500, and the gateway will
/// deliver the event again later.
pub async fn stripe_webhook<B: PaymentReconciliation, V: EventVerifier>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<B, V>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received webhook delivery ({} bytes)", body.len());
    let signature = req.headers().get(STRIPE_SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let outcome = api.handle_event(&body, signature).await?;
    Ok(HttpResponse::Ok().json(WebhookAck::new(outcome)))
}

//----------------------------------------------   Customer  ----------------------------------------------------
route!(customer_sub_order => Get "/orders/sub-order/{sub_order_id}" impl OrderManagement where requires [ActorRole::Customer]);
pub async fn customer_sub_order<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderStatusApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let sub_order_id = path.into_inner();
    let actor = Actor::customer(claims.user_id()?);
    debug!("💻️ GET sub-order #{sub_order_id} for {actor}");
    let details = api.sub_order_details(&actor, sub_order_id).await?;
    Ok(HttpResponse::Ok().json(details))
}

route!(review_status => Get "/orders/sub-order/{sub_order_id}/status" impl OrderManagement, ReviewManagement where requires [ActorRole::Customer]);
/// Reports whether the customer can still leave reviews for a completed sub-order, and which items they have
/// already reviewed.
pub async fn review_status<B: OrderManagement + ReviewManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<ReviewApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let sub_order_id = path.into_inner();
    let customer_id = claims.user_id()?;
    debug!("💻️ GET review status of sub-order #{sub_order_id} for customer #{customer_id}");
    let status = api.review_status(customer_id, sub_order_id).await?;
    Ok(HttpResponse::Ok().json(status))
}

route!(customer_update_status => Patch "/orders/{sub_order_id}/status" impl OrderManagement where requires [ActorRole::Customer]);
/// Customers can cancel a confirmed sub-order, and confirm receipt of a shipped one. Nothing else.
pub async fn customer_update_status<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<CustomerStatusUpdate>,
    api: web::Data<OrderStatusApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let sub_order_id = path.into_inner();
    let actor = Actor::customer(claims.user_id()?);
    let update = body.into_inner();
    debug!("💻️ PATCH sub-order #{sub_order_id} to {} for {actor}", update.status);
    let details = api.request_transition(&actor, sub_order_id, update.into()).await?;
    Ok(HttpResponse::Ok().json(details))
}

route!(create_review => Post "/reviews" impl OrderManagement, ReviewManagement where requires [ActorRole::Customer]);
pub async fn create_review<B: OrderManagement + ReviewManagement>(
    claims: JwtClaims,
    body: web::Json<NewReviewRequest>,
    api: web::Data<ReviewApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let customer_id = claims.user_id()?;
    let review = body.into_inner();
    debug!("💻️ POST review of order item #{} by customer #{customer_id}", review.order_item_id);
    let review = api.create_review(customer_id, review.into()).await?;
    Ok(HttpResponse::Created().json(review))
}

//----------------------------------------------   Store  ----------------------------------------------------
/// Resolves the store owned by the authenticated user.
pub async fn store_actor<B: OrderManagement>(claims: &JwtClaims, db: &B) -> Result<Actor, ServerError> {
    let user_id = claims.user_id()?;
    let store = db.fetch_store_for_owner(user_id).await.map_err(|e| ServerError::BackendError(e.to_string()))?;
    let store = store.ok_or_else(|| {
        debug!("💻️ User #{user_id} has the store role, but does not own a store");
        AuthError::StoreNotFound
    })?;
    Ok(Actor::store(user_id, store.id))
}

route!(store_sub_order => Get "/orders/{sub_order_id}" impl OrderManagement where requires [ActorRole::Store]);
pub async fn store_sub_order<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderStatusApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let sub_order_id = path.into_inner();
    let actor = store_actor(&claims, api.db()).await?;
    debug!("💻️ GET sub-order #{sub_order_id} for {actor}");
    let details = api.sub_order_details(&actor, sub_order_id).await?;
    Ok(HttpResponse::Ok().json(details))
}

route!(store_update_status => Patch "/orders/{sub_order_id}/status" impl OrderManagement where requires [ActorRole::Store]);
/// Stores move their paid sub-orders through processing, delivery and shipping, or cancel them before processing
/// starts. Carrier and tracking details may accompany any update.
pub async fn store_update_status<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<StoreStatusUpdate>,
    api: web::Data<OrderStatusApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let sub_order_id = path.into_inner();
    let actor = store_actor(&claims, api.db()).await?;
    let update = body.into_inner();
    debug!("💻️ PATCH sub-order #{sub_order_id} to {} for {actor}", update.status);
    let details = api.request_transition(&actor, sub_order_id, update.into()).await?;
    Ok(HttpResponse::Ok().json(details))
}

route!(reply_to_review => Post "/reviews/{review_id}/reply" impl OrderManagement, ReviewManagement where requires [ActorRole::Store]);
pub async fn reply_to_review<B: OrderManagement + ReviewManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<ReviewReplyRequest>,
    api: web::Data<ReviewApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let review_id = path.into_inner();
    let actor = store_actor(&claims, api.db()).await?;
    debug!("💻️ POST reply to review #{review_id} for {actor}");
    let review = api.reply_to_review(actor.owner_id, review_id, &body.reply).await?;
    Ok(HttpResponse::Ok().json(review))
}
