// Documentation for middleware can be found here:
// https://github.com/actix/actix-web/blob/master/src/middleware/normalize.rs
use crate::global::MainData;
use crate::user::ClientUser;
use actix_session::SessionExt;
use actix_utils::future::{ok, Ready};
use actix_web::dev::{
    forward_ready, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::error::InternalError;
use actix_web::http::header;
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse};
use futures_util::future::{FutureExt as _, LocalBoxFuture};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub const LOGIN_URL: &str = "/userprofile/login/";

/// Client data stored for a single request cycle.
/// Distinct from ClientCtx because it is defined through request data.
#[derive(Clone, Debug)]
pub struct ClientCtxInner {
    pub client: Option<ClientUser>,
    pub unread_notices: u64,
    /// Path and query of the request, used to come back after logging in.
    pub request_path: String,
    pub request_start: Instant,
}

impl Default for ClientCtxInner {
    fn default() -> Self {
        Self {
            client: None,
            unread_notices: 0,
            request_path: "/".to_owned(),
            request_start: Instant::now(),
        }
    }
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug, Default)]
pub struct ClientCtx(Rc<RefCell<ClientCtxInner>>);

impl ClientCtx {
    fn get_client_ctx(extensions: &mut Extensions) -> Self {
        match extensions.get::<Rc<RefCell<ClientCtxInner>>>() {
            // Existing record in extensions; pull it.
            Some(s_impl) => Self(Rc::clone(s_impl)),
            // No existing record; create and insert it.
            None => {
                let inner = Rc::new(RefCell::new(ClientCtxInner::default()));
                extensions.insert(inner.clone());
                Self(inner)
            }
        }
    }

    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<i32> {
        self.0.borrow().client.as_ref().map(|u| u.id)
    }

    /// Returns either the user's name or the word for guest.
    pub fn get_name(&self) -> String {
        match &self.0.borrow().client {
            Some(user) => user.name.to_owned(),
            None => "Guest".to_owned(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.0.borrow().client.is_some()
    }

    pub fn is_superuser(&self) -> bool {
        self.0
            .borrow()
            .client
            .as_ref()
            .map_or(false, |u| u.is_superuser)
    }

    pub fn unread_notices(&self) -> u64 {
        self.0.borrow().unread_notices
    }

    /// Returns the signed-in user's id, or an error that sends the client
    /// to the login page and back here afterwards.
    pub fn require_user(&self) -> Result<i32, Error> {
        match self.get_id() {
            Some(id) => Ok(id),
            None => {
                let next: String = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("next", &self.0.borrow().request_path)
                    .finish();
                let response = HttpResponse::Found()
                    .append_header((header::LOCATION, format!("{}?{}", LOGIN_URL, next)))
                    .finish();
                Err(InternalError::from_response("Login required.", response).into())
            }
        }
    }

    pub fn can_update_article(&self, author_id: i32) -> bool {
        self.get_id() == Some(author_id)
    }

    pub fn can_delete_article(&self, author_id: i32) -> bool {
        self.get_id() == Some(author_id)
    }

    /// Only the owner may change a profile or remove an account.
    pub fn can_edit_user(&self, user_id: i32) -> bool {
        self.get_id() == Some(user_id)
    }

    /// Returns Duration representing request time.
    pub fn request_time(&self) -> Duration {
        Instant::now() - self.0.borrow().request_start
    }

    /// Returns human readable representing request time.
    pub fn request_time_as_string(&self) -> String {
        let us = self.request_time().as_micros();
        if us > 5000 {
            format!("{}ms", us / 1000)
        } else {
            format!("{}μs", us)
        }
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    /// The associated error which can be returned.
    type Error = Error;
    /// Future that resolves to a Self.
    type Future = Ready<Result<Self, Self::Error>>;

    /// Create a Self from request parts asynchronously.
    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ok(ClientCtx::get_client_ctx(&mut req.extensions_mut()))
    }
}

impl<S, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ClientCtxMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ClientCtxMiddleware { service })
    }
}

/// Client context middleware
pub struct ClientCtxMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let cookies = req.get_session();
        let data = req.app_data::<Data<MainData>>().cloned();
        let ctx = ClientCtx::get_client_ctx(&mut req.extensions_mut());
        ctx.0.borrow_mut().request_path = req
            .uri()
            .path_and_query()
            .map_or_else(|| req.path().to_owned(), |pq| pq.as_str().to_owned());

        // Handler extraction only happens once `fut` is polled, after the client is set.
        let fut = self.service.call(req);

        async move {
            use crate::notification::unread_count;
            use crate::session::authenticate_client_by_session;

            match data {
                Some(data) => {
                    let client = authenticate_client_by_session(&data.pool, &cookies).await;
                    let unread_notices = match &client {
                        Some(user) => unread_count(&data.pool, user.id).await.unwrap_or_else(|e| {
                            log::error!("ClientCtxMiddleware: unread_count(): {}", e);
                            0
                        }),
                        None => 0,
                    };

                    let mut inner = ctx.0.borrow_mut();
                    inner.client = client;
                    inner.unread_notices = unread_notices;
                }
                None => {
                    log::error!("ClientCtxMiddleware: no MainData registered on the app.");
                }
            }

            fut.await
        }
        .boxed_local()
    }
}
