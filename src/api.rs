use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::auth::{bearer_token, AdminVerifier};
use crate::config::{AdminCredential, AppConfig};
use crate::error::{AppError, AppResult};
use crate::models::{
    NewParagraph, NewPassage, NewQuestion, NewQuestionPack, NewReadingTest, Paragraph,
    ParagraphUpdate, Passage, PassageAssignment, PassageDetail, PassageUpdate, Question,
    QuestionPack, QuestionPackDetail, QuestionPackUpdate, QuestionUpdate, ReadingTest,
    ReadingTestUpdate,
};
use crate::storage::ContentStore;

#[derive(Clone)]
pub struct AppState {
    store: Arc<ContentStore>,
    verifier: Arc<dyn AdminVerifier>,
}

impl AppState {
    pub fn new(store: ContentStore, verifier: impl AdminVerifier + 'static) -> Self {
        Self {
            store: Arc::new(store),
            verifier: Arc::new(verifier),
        }
    }
}

/// Present in a handler's arguments when the route is admin-only.
pub struct AdminGuard;

#[async_trait]
impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AppError::Unauthorized)?;

        if state.verifier.is_admin(token) {
            Ok(AdminGuard)
        } else {
            tracing::warn!(path = %parts.uri.path(), "rejected admin credential");
            Err(AppError::Unauthorized)
        }
    }
}

/// JSON body extractor whose rejections use the API error format.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| AppError::validation(rejection.body_text()))?;
        Ok(AppJson(value))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::Conflict(_) => StatusCode::CONFLICT,
        AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        });

        if matches!(self, AppError::Unauthorized) {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;
type Created<T> = Result<(StatusCode, Json<T>), AppError>;

/// Runs a store call off the async executor.
async fn blocking<T, F>(state: &AppState, f: F) -> AppResult<T>
where
    F: FnOnce(&ContentStore) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || f(&store)).await?
}

fn deleted(what: &str) -> Json<Value> {
    Json(json!({ "message": format!("{what} deleted successfully") }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Tests
        .route("/tests", get(list_tests).post(create_test))
        .route(
            "/tests/:test_id",
            get(get_test).put(update_test).delete(delete_test),
        )
        .route("/tests/:test_id/passages", get(list_test_passages))
        // Passages
        .route("/passages", get(list_passages).post(create_passage))
        .route(
            "/passages/:passage_id",
            get(get_passage).put(update_passage).delete(delete_passage),
        )
        .route(
            "/passages/:passage_id/test",
            put(assign_passage).delete(unassign_passage),
        )
        // Paragraphs
        .route(
            "/passages/:passage_id/paragraphs",
            get(list_paragraphs).post(create_paragraph),
        )
        .route(
            "/passages/:passage_id/paragraphs/:paragraph_id",
            put(update_paragraph).delete(delete_paragraph),
        )
        .route(
            "/passages/:passage_id/paragraphs/:paragraph_id/order",
            put(move_paragraph),
        )
        // Question packs
        .route(
            "/passages/:passage_id/question-packs",
            get(list_packs).post(create_pack),
        )
        .route(
            "/passages/:passage_id/question-packs/:pack_id",
            get(get_pack).put(update_pack).delete(delete_pack),
        )
        // Questions
        .route(
            "/passages/:passage_id/question-packs/:pack_id/questions",
            get(list_questions).post(create_question),
        )
        .route(
            "/passages/:passage_id/question-packs/:pack_id/questions/:question_id",
            get(get_question).put(update_question).delete(delete_question),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: AppConfig) -> AppResult<()> {
    let store = ContentStore::new(&config.data_dir)?;
    if let AdminCredential::Generated { plain, .. } = &config.admin {
        tracing::warn!("no ADMIN_TOKEN configured, generated a token for this run");
        println!("Admin token for this run: {plain}");
    }

    let state = AppState::new(store, config.admin.token().clone());
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("API server listening on {}", config.bind_addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

async fn list_tests(State(state): State<AppState>) -> ApiResult<Vec<ReadingTest>> {
    blocking(&state, |store| store.list_reading_tests()).await.map(Json)
}

async fn get_test(State(state): State<AppState>, Path(test_id): Path<i64>) -> ApiResult<ReadingTest> {
    blocking(&state, move |store| store.get_reading_test(test_id))
        .await
        .map(Json)
}

async fn create_test(
    _admin: AdminGuard,
    State(state): State<AppState>,
    AppJson(new): AppJson<NewReadingTest>,
) -> Created<ReadingTest> {
    let test = blocking(&state, move |store| store.create_reading_test(new)).await?;
    Ok((StatusCode::CREATED, Json(test)))
}

async fn update_test(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
    AppJson(update): AppJson<ReadingTestUpdate>,
) -> ApiResult<ReadingTest> {
    blocking(&state, move |store| store.update_reading_test(test_id, update))
        .await
        .map(Json)
}

async fn delete_test(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> ApiResult<Value> {
    blocking(&state, move |store| store.delete_reading_test(test_id)).await?;
    Ok(deleted("Test"))
}

async fn list_test_passages(
    State(state): State<AppState>,
    Path(test_id): Path<i64>,
) -> ApiResult<Vec<Passage>> {
    blocking(&state, move |store| store.list_test_passages(test_id))
        .await
        .map(Json)
}

// ---------------------------------------------------------------------------
// Passages
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct PassageFilter {
    #[serde(default)]
    unassigned: bool,
}

async fn list_passages(
    State(state): State<AppState>,
    Query(filter): Query<PassageFilter>,
) -> ApiResult<Vec<Passage>> {
    blocking(&state, move |store| {
        if filter.unassigned {
            store.list_unassigned_passages()
        } else {
            store.list_passages()
        }
    })
    .await
    .map(Json)
}

async fn get_passage(
    State(state): State<AppState>,
    Path(passage_id): Path<i64>,
) -> ApiResult<PassageDetail> {
    blocking(&state, move |store| store.get_passage(passage_id))
        .await
        .map(Json)
}

async fn create_passage(
    _admin: AdminGuard,
    State(state): State<AppState>,
    AppJson(new): AppJson<NewPassage>,
) -> Created<Passage> {
    let passage = blocking(&state, move |store| store.create_passage(new)).await?;
    Ok((StatusCode::CREATED, Json(passage)))
}

async fn update_passage(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path(passage_id): Path<i64>,
    AppJson(update): AppJson<PassageUpdate>,
) -> ApiResult<Passage> {
    blocking(&state, move |store| store.update_passage(passage_id, update))
        .await
        .map(Json)
}

async fn delete_passage(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path(passage_id): Path<i64>,
) -> ApiResult<Value> {
    blocking(&state, move |store| store.delete_passage(passage_id)).await?;
    Ok(deleted("Passage"))
}

async fn assign_passage(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path(passage_id): Path<i64>,
    AppJson(assignment): AppJson<PassageAssignment>,
) -> ApiResult<Passage> {
    blocking(&state, move |store| {
        store.assign_passage_to_test(passage_id, assignment.test_id)
    })
    .await
    .map(Json)
}

async fn unassign_passage(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path(passage_id): Path<i64>,
) -> ApiResult<Passage> {
    blocking(&state, move |store| store.unassign_passage(passage_id))
        .await
        .map(Json)
}

// ---------------------------------------------------------------------------
// Paragraphs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OrderQuery {
    new_order: i64,
}

async fn list_paragraphs(
    State(state): State<AppState>,
    Path(passage_id): Path<i64>,
) -> ApiResult<Vec<Paragraph>> {
    blocking(&state, move |store| store.list_paragraphs(passage_id))
        .await
        .map(Json)
}

async fn create_paragraph(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path(passage_id): Path<i64>,
    AppJson(new): AppJson<NewParagraph>,
) -> Created<Paragraph> {
    let paragraph = blocking(&state, move |store| store.create_paragraph(passage_id, new)).await?;
    Ok((StatusCode::CREATED, Json(paragraph)))
}

async fn update_paragraph(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path((passage_id, paragraph_id)): Path<(i64, i64)>,
    AppJson(update): AppJson<ParagraphUpdate>,
) -> ApiResult<Paragraph> {
    blocking(&state, move |store| {
        store.update_paragraph(passage_id, paragraph_id, update)
    })
    .await
    .map(Json)
}

async fn move_paragraph(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path((passage_id, paragraph_id)): Path<(i64, i64)>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Paragraph> {
    blocking(&state, move |store| {
        store.move_paragraph(passage_id, paragraph_id, query.new_order)
    })
    .await
    .map(Json)
}

async fn delete_paragraph(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path((passage_id, paragraph_id)): Path<(i64, i64)>,
) -> ApiResult<Value> {
    blocking(&state, move |store| store.delete_paragraph(passage_id, paragraph_id)).await?;
    Ok(deleted("Paragraph"))
}

// ---------------------------------------------------------------------------
// Question packs
// ---------------------------------------------------------------------------

async fn list_packs(
    State(state): State<AppState>,
    Path(passage_id): Path<i64>,
) -> ApiResult<Vec<QuestionPack>> {
    blocking(&state, move |store| store.list_question_packs(passage_id))
        .await
        .map(Json)
}

async fn get_pack(
    State(state): State<AppState>,
    Path((passage_id, pack_id)): Path<(i64, i64)>,
) -> ApiResult<QuestionPackDetail> {
    blocking(&state, move |store| store.get_question_pack(passage_id, pack_id))
        .await
        .map(Json)
}

async fn create_pack(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path(passage_id): Path<i64>,
    AppJson(new): AppJson<NewQuestionPack>,
) -> Created<QuestionPack> {
    let pack = blocking(&state, move |store| store.create_question_pack(passage_id, new)).await?;
    Ok((StatusCode::CREATED, Json(pack)))
}

async fn update_pack(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path((passage_id, pack_id)): Path<(i64, i64)>,
    AppJson(update): AppJson<QuestionPackUpdate>,
) -> ApiResult<QuestionPack> {
    blocking(&state, move |store| {
        store.update_question_pack(passage_id, pack_id, update)
    })
    .await
    .map(Json)
}

async fn delete_pack(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path((passage_id, pack_id)): Path<(i64, i64)>,
) -> ApiResult<Value> {
    blocking(&state, move |store| store.delete_question_pack(passage_id, pack_id)).await?;
    Ok(deleted("Question pack"))
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

async fn list_questions(
    State(state): State<AppState>,
    Path((passage_id, pack_id)): Path<(i64, i64)>,
) -> ApiResult<Vec<Question>> {
    blocking(&state, move |store| store.list_questions(passage_id, pack_id))
        .await
        .map(Json)
}

async fn get_question(
    State(state): State<AppState>,
    Path((passage_id, pack_id, question_id)): Path<(i64, i64, i64)>,
) -> ApiResult<Question> {
    blocking(&state, move |store| {
        store.get_question(passage_id, pack_id, question_id)
    })
    .await
    .map(Json)
}

async fn create_question(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path((passage_id, pack_id)): Path<(i64, i64)>,
    AppJson(new): AppJson<NewQuestion>,
) -> Created<Question> {
    let question = blocking(&state, move |store| {
        store.create_question(passage_id, pack_id, new)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

async fn update_question(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path((passage_id, pack_id, question_id)): Path<(i64, i64, i64)>,
    AppJson(update): AppJson<QuestionUpdate>,
) -> ApiResult<Question> {
    blocking(&state, move |store| {
        store.update_question(passage_id, pack_id, question_id, update)
    })
    .await
    .map(Json)
}

async fn delete_question(
    _admin: AdminGuard,
    State(state): State<AppState>,
    Path((passage_id, pack_id, question_id)): Path<(i64, i64, i64)>,
) -> ApiResult<Value> {
    blocking(&state, move |store| {
        store.delete_question(passage_id, pack_id, question_id)
    })
    .await?;
    Ok(deleted("Question"))
}
