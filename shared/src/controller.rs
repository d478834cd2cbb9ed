//! Application state machine.
//!
//! [`Controller::update`] consumes a [`Msg`] and returns the [`Effect`]s the
//! host has to run: API calls, whose responses come back as further messages,
//! and notice dismissal timers. The controller never awaits anything itself,
//! so every state change happens inside `update`.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::api::{ApiClient, HttpTransport};
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{Credential, RegisterRequest, Session, Task, TaskId};
use crate::session::{KeyValueStore, SessionStore};
use crate::view::{compute_stats, compute_visible, Filter, Stats};

pub const NETWORK_ERROR: &str = "Network error. Please try again.";
pub const SESSION_EXPIRED: &str = "Session expired. Please login again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unauthenticated,
    Authenticated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterField {
    Username,
    Email,
    Password,
    Password2,
    FirstName,
    LastName,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTaskForm {
    pub title: String,
    pub description: String,
}

pub type NoticeId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: NoticeId,
    pub kind: NoticeKind,
    pub message: String,
}

/// Requests currently in flight, used to disable buttons and drop repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pending {
    pub login: bool,
    pub register: bool,
    pub create: bool,
    pub tasks: BTreeSet<TaskId>,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub session: Option<Session>,
    pub auth_mode: AuthMode,
    pub login_form: LoginForm,
    pub register_form: RegisterRequest,
    /// Last successful list fetch, verbatim.
    pub tasks: Vec<Task>,
    pub loading: bool,
    pub filter: Filter,
    pub search: String,
    pub new_task: NewTaskForm,
    pub pending: Pending,
    pub notices: Vec<Notice>,
    next_notice_id: NoticeId,
}

impl AppState {
    pub fn phase(&self) -> Phase {
        if self.session.is_some() {
            Phase::Authenticated
        } else {
            Phase::Unauthenticated
        }
    }

    pub fn visible_tasks(&self) -> Vec<&Task> {
        compute_visible(&self.tasks, self.filter, &self.search)
    }

    pub fn stats(&self) -> Stats {
        compute_stats(&self.tasks)
    }

    pub fn is_task_pending(&self, id: TaskId) -> bool {
        self.pending.tasks.contains(&id)
    }

    fn credential(&self) -> Option<&Credential> {
        self.session.as_ref().map(|session| &session.credential)
    }
}

#[derive(Debug, Clone)]
pub enum Msg {
    ShowLogin,
    ShowRegister,
    EditLogin(LoginField, String),
    EditRegister(RegisterField, String),
    SubmitLogin,
    SubmitRegister,
    LoggedIn(ApiResult<Session>),
    Registered(ApiResult<Session>),
    Logout,
    LogoutSent(ApiResult<()>),

    Refresh,
    TasksLoaded {
        credential: Credential,
        result: ApiResult<Vec<Task>>,
    },
    SetNewTaskTitle(String),
    SetNewTaskDescription(String),
    CreateTask,
    TaskCreated(ApiResult<()>),
    ToggleTask(TaskId),
    TaskToggled {
        id: TaskId,
        result: ApiResult<()>,
    },
    DeleteTask(TaskId),
    TaskDeleted {
        id: TaskId,
        result: ApiResult<()>,
    },
    SetFilter(Filter),
    SetSearch(String),

    DismissNotice(NoticeId),
}

/// An API request for the host to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Login { username: String, password: String },
    Register(RegisterRequest),
    Logout(Credential),
    ListTasks(Credential),
    CreateTask {
        credential: Credential,
        title: String,
        description: String,
    },
    SetCompleted {
        credential: Credential,
        id: TaskId,
        completed: bool,
    },
    DeleteTask {
        credential: Credential,
        id: TaskId,
    },
}

impl ApiCall {
    pub fn name(&self) -> &'static str {
        match self {
            ApiCall::Login { .. } => "login",
            ApiCall::Register(_) => "register",
            ApiCall::Logout(_) => "logout",
            ApiCall::ListTasks(_) => "list_tasks",
            ApiCall::CreateTask { .. } => "create_task",
            ApiCall::SetCompleted { .. } => "set_completed",
            ApiCall::DeleteTask { .. } => "delete_task",
        }
    }

    /// Runs the request and wraps its outcome in the matching response message.
    pub async fn perform<T: HttpTransport>(self, client: &ApiClient<T>) -> Msg {
        match self {
            ApiCall::Login { username, password } => {
                Msg::LoggedIn(client.login(&username, &password).await)
            }
            ApiCall::Register(form) => Msg::Registered(client.register(&form).await),
            ApiCall::Logout(credential) => Msg::LogoutSent(client.logout(&credential).await),
            ApiCall::ListTasks(credential) => {
                let result = client.list_tasks(&credential).await;
                Msg::TasksLoaded { credential, result }
            }
            ApiCall::CreateTask {
                credential,
                title,
                description,
            } => Msg::TaskCreated(client.create_task(&credential, &title, &description).await),
            ApiCall::SetCompleted {
                credential,
                id,
                completed,
            } => Msg::TaskToggled {
                id,
                result: client.set_completed(&credential, id, completed).await,
            },
            ApiCall::DeleteTask { credential, id } => Msg::TaskDeleted {
                id,
                result: client.delete_task(&credential, id).await,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Call(ApiCall),
    DismissNotice { id: NoticeId, after_ms: u32 },
}

pub struct Controller<S> {
    state: AppState,
    sessions: SessionStore<S>,
    notice_ttl_ms: u32,
}

impl<S: KeyValueStore> Controller<S> {
    pub fn new(sessions: SessionStore<S>, config: &ClientConfig) -> Self {
        Self {
            state: AppState::default(),
            sessions,
            notice_ttl_ms: config.notice_ttl_ms,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn sessions(&self) -> &SessionStore<S> {
        &self.sessions
    }

    /// Restores a persisted session, trusting it until a fetch proves otherwise.
    pub fn start(&mut self) -> Vec<Effect> {
        match self.sessions.load() {
            Some(session) => {
                info!(username = %session.user.username, "restored persisted session");
                let credential = session.credential.clone();
                self.state.session = Some(session);
                self.state.loading = true;
                vec![Effect::Call(ApiCall::ListTasks(credential))]
            }
            None => Vec::new(),
        }
    }

    pub fn update(&mut self, msg: Msg) -> Vec<Effect> {
        match msg {
            Msg::ShowLogin => {
                self.state.auth_mode = AuthMode::Login;
                Vec::new()
            }
            Msg::ShowRegister => {
                self.state.auth_mode = AuthMode::Register;
                Vec::new()
            }
            Msg::EditLogin(field, value) => {
                let form = &mut self.state.login_form;
                match field {
                    LoginField::Username => form.username = value,
                    LoginField::Password => form.password = value,
                }
                Vec::new()
            }
            Msg::EditRegister(field, value) => {
                let form = &mut self.state.register_form;
                match field {
                    RegisterField::Username => form.username = value,
                    RegisterField::Email => form.email = value,
                    RegisterField::Password => form.password = value,
                    RegisterField::Password2 => form.password2 = value,
                    RegisterField::FirstName => form.first_name = value,
                    RegisterField::LastName => form.last_name = value,
                }
                Vec::new()
            }
            Msg::SubmitLogin => self.submit_login(),
            Msg::SubmitRegister => self.submit_register(),
            Msg::LoggedIn(result) => {
                self.state.pending.login = false;
                self.finish_auth(result, "Login successful!", |err| match err {
                    ApiError::Network(_) => NETWORK_ERROR.to_string(),
                    ApiError::Auth(message) => message.clone(),
                    _ => "Login failed".to_string(),
                })
            }
            Msg::Registered(result) => {
                self.state.pending.register = false;
                self.finish_auth(result, "Registration successful! Welcome!", |err| match err {
                    ApiError::Network(_) => NETWORK_ERROR.to_string(),
                    ApiError::Validation(errors) => errors.to_string(),
                    _ => "Registration failed".to_string(),
                })
            }
            Msg::Logout => {
                let Some(session) = self.state.session.clone() else {
                    return Vec::new();
                };
                info!(username = %session.user.username, "logging out");
                self.teardown();
                let mut effects = vec![Effect::Call(ApiCall::Logout(session.credential))];
                effects.extend(self.notify(NoticeKind::Success, "Logged out successfully"));
                effects
            }
            Msg::LogoutSent(result) => {
                if let Err(e) = result {
                    warn!("Logout notification failed: {e}");
                }
                Vec::new()
            }

            Msg::Refresh => self.refresh(),
            Msg::TasksLoaded { credential, result } => self.tasks_loaded(credential, result),
            Msg::SetNewTaskTitle(title) => {
                self.state.new_task.title = title;
                Vec::new()
            }
            Msg::SetNewTaskDescription(description) => {
                self.state.new_task.description = description;
                Vec::new()
            }
            Msg::CreateTask => self.create_task(),
            Msg::TaskCreated(result) => {
                self.state.pending.create = false;
                match result {
                    Ok(()) => {
                        self.state.new_task = NewTaskForm::default();
                        let mut effects = self.notify(NoticeKind::Success, "Task added successfully!");
                        effects.extend(self.refresh());
                        effects
                    }
                    Err(ApiError::Auth(_)) => self.expire_session(),
                    Err(ApiError::Network(_)) => self.notify(NoticeKind::Error, "Network error"),
                    Err(e) => {
                        warn!("Creating task failed: {e}");
                        self.notify(NoticeKind::Error, "Failed to add task")
                    }
                }
            }
            Msg::ToggleTask(id) => self.toggle_task(id),
            Msg::TaskToggled { id, result } => {
                self.state.pending.tasks.remove(&id);
                match result {
                    Ok(()) => self.refresh(),
                    Err(ApiError::Auth(_)) => self.expire_session(),
                    Err(e) => {
                        warn!(task = id, "Updating task failed: {e}");
                        self.notify(NoticeKind::Error, "Error updating task")
                    }
                }
            }
            Msg::DeleteTask(id) => self.delete_task(id),
            Msg::TaskDeleted { id, result } => {
                self.state.pending.tasks.remove(&id);
                match result {
                    Ok(()) => {
                        let mut effects = self.notify(NoticeKind::Success, "Task deleted successfully");
                        effects.extend(self.refresh());
                        effects
                    }
                    Err(ApiError::Auth(_)) => self.expire_session(),
                    Err(e) => {
                        warn!(task = id, "Deleting task failed: {e}");
                        self.notify(NoticeKind::Error, "Error deleting task")
                    }
                }
            }
            Msg::SetFilter(filter) => {
                self.state.filter = filter;
                Vec::new()
            }
            Msg::SetSearch(search) => {
                self.state.search = search;
                Vec::new()
            }

            Msg::DismissNotice(id) => {
                self.state.notices.retain(|notice| notice.id != id);
                Vec::new()
            }
        }
    }

    fn submit_login(&mut self) -> Vec<Effect> {
        if self.state.pending.login {
            return Vec::new();
        }
        let form = &self.state.login_form;
        if form.username.trim().is_empty() || form.password.is_empty() {
            return self.notify(NoticeKind::Error, "Please enter your username and password");
        }
        let call = ApiCall::Login {
            username: form.username.trim().to_string(),
            password: form.password.clone(),
        };
        self.state.pending.login = true;
        vec![Effect::Call(call)]
    }

    fn submit_register(&mut self) -> Vec<Effect> {
        if self.state.pending.register {
            return Vec::new();
        }
        let form = &self.state.register_form;
        let required = [&form.username, &form.email, &form.password, &form.password2];
        if required.iter().any(|value| value.trim().is_empty()) {
            return self.notify(NoticeKind::Error, "Please fill in all required fields");
        }
        let call = ApiCall::Register(form.clone());
        self.state.pending.register = true;
        vec![Effect::Call(call)]
    }

    fn finish_auth(
        &mut self,
        result: ApiResult<Session>,
        success: &str,
        describe: impl FnOnce(&ApiError) -> String,
    ) -> Vec<Effect> {
        match result {
            Ok(session) => {
                info!(username = %session.user.username, "signed in");
                if let Err(e) = self.sessions.save(&session.credential, &session.user) {
                    warn!("Failed to persist session: {e}");
                }
                self.state.login_form = LoginForm::default();
                self.state.register_form = RegisterRequest::default();
                self.state.tasks.clear();
                self.state.session = Some(session);
                let mut effects = self.notify(NoticeKind::Success, success);
                effects.extend(self.refresh());
                effects
            }
            Err(e) => {
                debug!("authentication rejected: {e}");
                let message = describe(&e);
                self.notify(NoticeKind::Error, message)
            }
        }
    }

    fn refresh(&mut self) -> Vec<Effect> {
        match self.state.credential() {
            Some(credential) => {
                let credential = credential.clone();
                self.state.loading = true;
                vec![Effect::Call(ApiCall::ListTasks(credential))]
            }
            None => Vec::new(),
        }
    }

    fn tasks_loaded(&mut self, credential: Credential, result: ApiResult<Vec<Task>>) -> Vec<Effect> {
        if self.state.credential() != Some(&credential) {
            debug!("discarding task list fetched under a previous session");
            return Vec::new();
        }
        self.state.loading = false;
        match result {
            Ok(tasks) => {
                debug!(count = tasks.len(), "task cache replaced");
                self.state.tasks = tasks;
                Vec::new()
            }
            Err(ApiError::Auth(_)) => self.expire_session(),
            Err(e) => {
                warn!("Loading tasks failed: {e}");
                self.notify(NoticeKind::Error, "Error loading tasks")
            }
        }
    }

    fn create_task(&mut self) -> Vec<Effect> {
        let Some(credential) = self.state.credential().cloned() else {
            return Vec::new();
        };
        if self.state.pending.create {
            return Vec::new();
        }
        let title = self.state.new_task.title.trim().to_string();
        if title.is_empty() {
            return self.notify(NoticeKind::Error, "Please enter a task title");
        }
        self.state.pending.create = true;
        vec![Effect::Call(ApiCall::CreateTask {
            credential,
            title,
            description: self.state.new_task.description.clone(),
        })]
    }

    fn toggle_task(&mut self, id: TaskId) -> Vec<Effect> {
        let Some(credential) = self.state.credential().cloned() else {
            return Vec::new();
        };
        if self.state.is_task_pending(id) {
            debug!(task = id, "request already in flight, ignoring toggle");
            return Vec::new();
        }
        let Some(task) = self.state.tasks.iter().find(|task| task.id == id) else {
            return Vec::new();
        };
        let completed = !task.completed;
        self.state.pending.tasks.insert(id);
        vec![Effect::Call(ApiCall::SetCompleted {
            credential,
            id,
            completed,
        })]
    }

    fn delete_task(&mut self, id: TaskId) -> Vec<Effect> {
        let Some(credential) = self.state.credential().cloned() else {
            return Vec::new();
        };
        if self.state.is_task_pending(id) {
            debug!(task = id, "request already in flight, ignoring delete");
            return Vec::new();
        }
        self.state.pending.tasks.insert(id);
        vec![Effect::Call(ApiCall::DeleteTask { credential, id })]
    }

    /// The server rejected the active credential. Responses that arrive after
    /// the session already ended are ignored.
    fn expire_session(&mut self) -> Vec<Effect> {
        if self.state.session.is_none() {
            return Vec::new();
        }
        info!("credential rejected, ending session");
        self.teardown();
        self.notify(NoticeKind::Error, SESSION_EXPIRED)
    }

    /// Drops the session and everything derived from it.
    fn teardown(&mut self) {
        if let Err(e) = self.sessions.clear() {
            warn!("Failed to clear persisted session: {e}");
        }
        self.state.session = None;
        self.state.auth_mode = AuthMode::Login;
        self.state.tasks.clear();
        self.state.loading = false;
        self.state.filter = Filter::default();
        self.state.search.clear();
        self.state.new_task = NewTaskForm::default();
        self.state.pending = Pending::default();
    }

    fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) -> Vec<Effect> {
        let id = self.state.next_notice_id;
        self.state.next_notice_id += 1;
        self.state.notices.push(Notice {
            id,
            kind,
            message: message.into(),
        });
        vec![Effect::DismissNotice {
            id,
            after_ms: self.notice_ttl_ms,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{HttpRequest, HttpResponse, LOGIN_PATH, LOGOUT_PATH, REGISTER_PATH, TASKS_PATH};
    use crate::error::TransportError;
    use crate::models::{CreateTaskRequest, LoginRequest, UpdateTaskRequest, User};
    use crate::session::{MemoryStore, AUTH_TOKEN_KEY};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use http::{header, Method, StatusCode};
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct ServerState {
        users: Vec<(User, String)>,
        tokens: Vec<(String, u64)>,
        tasks: Vec<(u64, Task)>,
        next_task_id: TaskId,
        offline: bool,
        fail_mutations: bool,
        malformed_login: bool,
    }

    /// In-memory stand-in for the task API.
    #[derive(Clone, Default)]
    struct FakeServer {
        state: Rc<RefCell<ServerState>>,
        log: Rc<RefCell<Vec<HttpRequest>>>,
    }

    impl FakeServer {
        fn with_user(username: &str, password: &str) -> Self {
            let server = Self::default();
            server.state.borrow_mut().users.push((
                User {
                    id: 1,
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                },
                password.to_string(),
            ));
            server
        }

        fn issue_token(&self, user_id: u64) -> String {
            let mut state = self.state.borrow_mut();
            let token = format!("token-{}-{}", user_id, state.tokens.len());
            state.tokens.push((token.clone(), user_id));
            token
        }

        fn seed_task(&self, owner: u64, title: &str, completed: bool) -> TaskId {
            let mut state = self.state.borrow_mut();
            state.next_task_id += 1;
            let id = state.next_task_id;
            let task = Task {
                id,
                title: title.to_string(),
                description: None,
                completed,
                created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
                    + Duration::minutes(id as i64),
                updated_at: None,
                user: None,
            };
            state.tasks.push((owner, task));
            id
        }

        fn revoke_all_tokens(&self) {
            self.state.borrow_mut().tokens.clear();
        }

        fn requests_to(&self, method: Method, path: &str) -> usize {
            self.log
                .borrow()
                .iter()
                .filter(|r| r.method == method && r.url.ends_with(path))
                .count()
        }

        fn authenticate(&self, request: &HttpRequest) -> Option<u64> {
            let value = request.header(&header::AUTHORIZATION)?;
            let token = value.strip_prefix("Token ")?;
            self.state
                .borrow()
                .tokens
                .iter()
                .find(|(candidate, _)| candidate == token)
                .map(|(_, user)| *user)
        }

        fn route(&self, request: &HttpRequest) -> HttpResponse {
            let path = request
                .url
                .strip_prefix("http://127.0.0.1:8000/api")
                .unwrap_or(&request.url)
                .to_string();
            let body = request.body.clone().unwrap_or_default();

            if request.method == Method::POST && path == LOGIN_PATH {
                if self.state.borrow().malformed_login {
                    return ok(json!({"detail": "ok"}));
                }
                let form: LoginRequest = serde_json::from_str(&body).unwrap();
                let user = self
                    .state
                    .borrow()
                    .users
                    .iter()
                    .find(|(user, password)| user.username == form.username && *password == form.password)
                    .map(|(user, _)| user.clone());
                return match user {
                    Some(user) => {
                        let token = self.issue_token(user.id);
                        ok(json!({"token": token, "user_id": user.id, "username": user.username, "email": user.email}))
                    }
                    None => HttpResponse::new(
                        StatusCode::UNAUTHORIZED,
                        json!({"error": "Invalid credentials"}).to_string(),
                    ),
                };
            }
            if request.method == Method::POST && path == REGISTER_PATH {
                let form: RegisterRequest = serde_json::from_str(&body).unwrap();
                if form.password != form.password2 {
                    return HttpResponse::new(
                        StatusCode::BAD_REQUEST,
                        json!({"password": ["Password fields didn't match."]}).to_string(),
                    );
                }
                let user = User {
                    id: self.state.borrow().users.len() as u64 + 1,
                    username: form.username,
                    email: form.email,
                };
                self.state.borrow_mut().users.push((user.clone(), form.password));
                let token = self.issue_token(user.id);
                return HttpResponse::new(
                    StatusCode::CREATED,
                    json!({"user": user, "token": token, "message": "User registered successfully"})
                        .to_string(),
                );
            }

            let Some(user_id) = self.authenticate(request) else {
                return HttpResponse::new(
                    StatusCode::UNAUTHORIZED,
                    json!({"detail": "Invalid token."}).to_string(),
                );
            };
            if request.method != Method::GET && path != LOGOUT_PATH && self.state.borrow().fail_mutations {
                return HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "");
            }

            match (request.method.as_str(), path.as_str()) {
                ("POST", LOGOUT_PATH) => {
                    self.state.borrow_mut().tokens.retain(|(_, user)| *user != user_id);
                    ok(json!({"message": "Successfully logged out"}))
                }
                ("GET", TASKS_PATH) => {
                    let mut tasks: Vec<Task> = self
                        .state
                        .borrow()
                        .tasks
                        .iter()
                        .filter(|(owner, _)| *owner == user_id)
                        .map(|(_, task)| task.clone())
                        .collect();
                    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                    ok(json!({"count": tasks.len(), "next": null, "previous": null, "results": tasks}))
                }
                ("POST", TASKS_PATH) => {
                    let form: CreateTaskRequest = serde_json::from_str(&body).unwrap();
                    let id = self.seed_task(user_id, &form.title, form.completed);
                    HttpResponse::new(StatusCode::CREATED, json!({"id": id}).to_string())
                }
                (method, path) => {
                    let id: TaskId = path
                        .trim_start_matches("/tasks/")
                        .trim_end_matches('/')
                        .parse()
                        .unwrap();
                    let mut state = self.state.borrow_mut();
                    let Some(index) = state
                        .tasks
                        .iter()
                        .position(|(owner, task)| *owner == user_id && task.id == id)
                    else {
                        return HttpResponse::new(StatusCode::NOT_FOUND, "");
                    };
                    if method == "PATCH" {
                        let update: UpdateTaskRequest = serde_json::from_str(&body).unwrap();
                        state.tasks[index].1.completed = update.completed;
                        ok(json!(state.tasks[index].1))
                    } else {
                        state.tasks.remove(index);
                        ok(json!({"message": "Task deleted successfully"}))
                    }
                }
            }
        }
    }

    fn ok(body: serde_json::Value) -> HttpResponse {
        HttpResponse::new(StatusCode::OK, body.to_string())
    }

    #[async_trait(?Send)]
    impl HttpTransport for FakeServer {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.log.borrow_mut().push(request.clone());
            if self.state.borrow().offline {
                return Err(TransportError::new("Failed to fetch"));
            }
            Ok(self.route(&request))
        }
    }

    struct Harness {
        controller: Controller<MemoryStore>,
        client: ApiClient<FakeServer>,
        server: FakeServer,
        storage: MemoryStore,
        timers: Vec<Effect>,
    }

    impl Harness {
        fn new(server: FakeServer, storage: MemoryStore) -> Self {
            let config = ClientConfig::default();
            Self {
                controller: Controller::new(SessionStore::new(storage.clone()), &config),
                client: ApiClient::new(&config, server.clone()),
                server,
                storage,
                timers: Vec::new(),
            }
        }

        fn state(&self) -> &AppState {
            self.controller.state()
        }

        async fn start(&mut self) {
            let effects = self.controller.start();
            self.run_effects(effects).await;
        }

        /// Feeds `msg` and every response it triggers until the queue drains.
        async fn send(&mut self, msg: Msg) {
            let effects = self.controller.update(msg);
            self.run_effects(effects).await;
        }

        async fn run_effects(&mut self, effects: Vec<Effect>) {
            let mut queue: VecDeque<Effect> = effects.into();
            while let Some(effect) = queue.pop_front() {
                match effect {
                    Effect::Call(call) => {
                        let response = call.perform(&self.client).await;
                        queue.extend(self.controller.update(response));
                    }
                    timer => self.timers.push(timer),
                }
            }
        }

        async fn login(&mut self, username: &str, password: &str) {
            self.send(Msg::EditLogin(LoginField::Username, username.into())).await;
            self.send(Msg::EditLogin(LoginField::Password, password.into())).await;
            self.send(Msg::SubmitLogin).await;
        }

        fn last_notice(&self) -> Option<&str> {
            self.state().notices.last().map(|notice| notice.message.as_str())
        }

        fn task_titles(&self) -> Vec<&str> {
            self.state().tasks.iter().map(|task| task.title.as_str()).collect()
        }
    }

    fn alice_server() -> FakeServer {
        FakeServer::with_user("alice", "secret")
    }

    #[tokio::test]
    async fn starts_unauthenticated_without_persisted_session() {
        let mut harness = Harness::new(alice_server(), MemoryStore::new());
        harness.start().await;

        assert_eq!(harness.state().phase(), Phase::Unauthenticated);
        assert!(harness.server.log.borrow().is_empty());
    }

    #[tokio::test]
    async fn login_persists_session_and_loads_tasks() {
        let server = alice_server();
        server.seed_task(1, "Buy milk", false);
        server.seed_task(1, "Pay rent", true);
        server.seed_task(2, "Someone else's", false);
        let mut harness = Harness::new(server, MemoryStore::new());

        harness.login("alice", "secret").await;

        assert_eq!(harness.state().phase(), Phase::Authenticated);
        assert_eq!(harness.task_titles(), vec!["Pay rent", "Buy milk"]);
        assert_eq!(harness.state().login_form, LoginForm::default());
        assert!(!harness.state().pending.login);
        assert!(harness.controller.sessions().load().is_some());
        assert_eq!(harness.state().notices[0].message, "Login successful!");
        assert_eq!(harness.state().notices[0].kind, NoticeKind::Success);
        assert!(matches!(
            harness.timers[0],
            Effect::DismissNotice { after_ms: 4000, .. }
        ));
    }

    #[tokio::test]
    async fn wrong_password_stays_unauthenticated() {
        let mut harness = Harness::new(alice_server(), MemoryStore::new());
        harness.login("alice", "nope").await;

        assert_eq!(harness.state().phase(), Phase::Unauthenticated);
        assert_eq!(harness.last_notice(), Some("Invalid credentials"));
        assert!(harness.storage.is_empty());
    }

    #[tokio::test]
    async fn malformed_login_response_shows_generic_failure() {
        let server = alice_server();
        server.state.borrow_mut().malformed_login = true;
        let mut harness = Harness::new(server, MemoryStore::new());
        harness.login("alice", "secret").await;

        assert_eq!(harness.state().phase(), Phase::Unauthenticated);
        assert_eq!(harness.last_notice(), Some("Login failed"));
        assert!(harness.storage.is_empty());
    }

    #[tokio::test]
    async fn empty_login_form_issues_no_request() {
        let mut harness = Harness::new(alice_server(), MemoryStore::new());
        harness.send(Msg::SubmitLogin).await;

        assert!(harness.server.log.borrow().is_empty());
        assert_eq!(
            harness.last_notice(),
            Some("Please enter your username and password")
        );
    }

    #[tokio::test]
    async fn register_validation_errors_are_shown_verbatim() {
        let mut harness = Harness::new(alice_server(), MemoryStore::new());
        harness.send(Msg::ShowRegister).await;
        for (field, value) in [
            (RegisterField::Username, "bob"),
            (RegisterField::Email, "bob@example.com"),
            (RegisterField::Password, "pw-one"),
            (RegisterField::Password2, "pw-two"),
        ] {
            harness.send(Msg::EditRegister(field, value.into())).await;
        }
        harness.send(Msg::SubmitRegister).await;

        assert_eq!(harness.state().phase(), Phase::Unauthenticated);
        assert_eq!(harness.last_notice(), Some("Password fields didn't match."));
        assert_eq!(harness.state().auth_mode, AuthMode::Register);

        harness
            .send(Msg::EditRegister(RegisterField::Password2, "pw-one".into()))
            .await;
        harness.send(Msg::SubmitRegister).await;

        assert_eq!(harness.state().phase(), Phase::Authenticated);
        assert_eq!(
            harness.state().session.as_ref().map(|s| s.user.username.as_str()),
            Some("bob")
        );
        assert_eq!(harness.last_notice(), Some("Registration successful! Welcome!"));
        assert_eq!(harness.server.requests_to(Method::GET, TASKS_PATH), 1);
    }

    #[tokio::test]
    async fn persisted_session_is_trusted_on_start() {
        let server = alice_server();
        let token = server.issue_token(1);
        server.seed_task(1, "Buy milk", false);
        let storage = MemoryStore::new();
        SessionStore::new(storage.clone())
            .save(
                &Credential::new(token),
                &User {
                    id: 1,
                    username: "alice".into(),
                    email: String::new(),
                },
            )
            .unwrap();

        let mut harness = Harness::new(server, storage);
        harness.start().await;

        assert_eq!(harness.state().phase(), Phase::Authenticated);
        assert_eq!(harness.task_titles(), vec!["Buy milk"]);
        assert!(!harness.state().loading);
    }

    #[tokio::test]
    async fn unauthorized_list_forces_logout() {
        let server = alice_server();
        server.seed_task(1, "Buy milk", false);
        let mut harness = Harness::new(server, MemoryStore::new());
        harness.login("alice", "secret").await;
        harness.send(Msg::SetFilter(Filter::Completed)).await;

        harness.server.revoke_all_tokens();
        harness.send(Msg::Refresh).await;

        assert_eq!(harness.state().phase(), Phase::Unauthenticated);
        assert!(harness.state().tasks.is_empty());
        assert_eq!(harness.state().filter, Filter::All);
        assert_eq!(harness.last_notice(), Some(SESSION_EXPIRED));
        assert_eq!(harness.storage.get(AUTH_TOKEN_KEY).unwrap(), None);
        assert!(harness.controller.sessions().load().is_none());
    }

    #[tokio::test]
    async fn rejected_mutation_ends_persisted_session() {
        let server = alice_server();
        let token = server.issue_token(1);
        let milk = server.seed_task(1, "Buy milk", false);
        let storage = MemoryStore::new();
        SessionStore::new(storage.clone())
            .save(
                &Credential::new(token),
                &User {
                    id: 1,
                    username: "alice".into(),
                    email: String::new(),
                },
            )
            .unwrap();
        let mut harness = Harness::new(server, storage);
        harness.start().await;
        assert_eq!(harness.task_titles(), vec!["Buy milk"]);

        harness.server.revoke_all_tokens();
        harness.send(Msg::ToggleTask(milk)).await;

        assert_eq!(harness.state().phase(), Phase::Unauthenticated);
        assert!(harness.state().tasks.is_empty());
        assert!(harness.storage.is_empty());
        assert_eq!(harness.last_notice(), Some(SESSION_EXPIRED));

        harness.send(Msg::DeleteTask(milk)).await;
        assert_eq!(harness.server.requests_to(Method::DELETE, &format!("/tasks/{milk}/")), 0);
    }

    #[tokio::test]
    async fn rejected_delete_and_create_end_session() {
        for msg in [Msg::DeleteTask(1), Msg::CreateTask] {
            let server = alice_server();
            server.seed_task(1, "Buy milk", false);
            let mut harness = Harness::new(server, MemoryStore::new());
            harness.login("alice", "secret").await;
            harness.send(Msg::SetNewTaskTitle("Write report".into())).await;

            harness.server.revoke_all_tokens();
            harness.send(msg).await;

            assert_eq!(harness.state().phase(), Phase::Unauthenticated);
            assert!(harness.controller.sessions().load().is_none());
            assert_eq!(harness.last_notice(), Some(SESSION_EXPIRED));
            assert_eq!(harness.server.requests_to(Method::GET, TASKS_PATH), 1);
        }
    }

    #[tokio::test]
    async fn network_failure_on_create_keeps_form() {
        let mut harness = Harness::new(alice_server(), MemoryStore::new());
        harness.login("alice", "secret").await;
        harness.send(Msg::SetNewTaskTitle("Write report".into())).await;
        harness.server.state.borrow_mut().offline = true;

        harness.send(Msg::CreateTask).await;

        assert_eq!(harness.last_notice(), Some("Network error"));
        assert_eq!(harness.state().new_task.title, "Write report");
        assert!(!harness.state().pending.create);
        assert_eq!(harness.state().phase(), Phase::Authenticated);
    }

    #[tokio::test]
    async fn create_task_refreshes_with_server_assigned_id() {
        let mut harness = Harness::new(alice_server(), MemoryStore::new());
        harness.login("alice", "secret").await;

        harness
            .send(Msg::SetNewTaskTitle("  Write report  ".into()))
            .await;
        harness
            .send(Msg::SetNewTaskDescription("quarterly numbers".into()))
            .await;
        harness.send(Msg::CreateTask).await;

        let tasks = &harness.state().tasks;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Write report");
        assert_eq!(tasks[0].id, 1);
        assert_eq!(harness.state().new_task, NewTaskForm::default());
        assert_eq!(harness.last_notice(), Some("Task added successfully!"));
        assert_eq!(harness.server.requests_to(Method::GET, TASKS_PATH), 2);
    }

    #[tokio::test]
    async fn blank_title_is_rejected_locally() {
        let mut harness = Harness::new(alice_server(), MemoryStore::new());
        harness.login("alice", "secret").await;
        harness.send(Msg::SetNewTaskTitle("   ".into())).await;
        harness.send(Msg::CreateTask).await;

        assert_eq!(harness.server.requests_to(Method::POST, TASKS_PATH), 0);
        assert_eq!(harness.last_notice(), Some("Please enter a task title"));
    }

    #[tokio::test]
    async fn toggle_and_delete_round_trip_through_server() {
        let server = alice_server();
        let milk = server.seed_task(1, "Buy milk", false);
        let rent = server.seed_task(1, "Pay rent", false);
        let mut harness = Harness::new(server, MemoryStore::new());
        harness.login("alice", "secret").await;

        harness.send(Msg::ToggleTask(milk)).await;
        assert_eq!(harness.state().stats().completed, 1);
        assert!(harness.state().pending.tasks.is_empty());

        harness.send(Msg::DeleteTask(rent)).await;
        assert_eq!(harness.task_titles(), vec!["Buy milk"]);
        assert_eq!(harness.last_notice(), Some("Task deleted successfully"));

        harness.send(Msg::SetFilter(Filter::Active)).await;
        assert!(harness.state().visible_tasks().is_empty());
    }

    #[tokio::test]
    async fn failed_mutation_shows_notice_without_refresh() {
        let server = alice_server();
        let milk = server.seed_task(1, "Buy milk", false);
        let mut harness = Harness::new(server, MemoryStore::new());
        harness.login("alice", "secret").await;
        harness.server.state.borrow_mut().fail_mutations = true;

        harness.send(Msg::ToggleTask(milk)).await;

        assert_eq!(harness.last_notice(), Some("Error updating task"));
        assert_eq!(harness.server.requests_to(Method::GET, TASKS_PATH), 1);
        assert!(!harness.state().tasks[0].completed);
    }

    #[tokio::test]
    async fn in_flight_task_ignores_repeat_clicks() {
        let server = alice_server();
        let milk = server.seed_task(1, "Buy milk", false);
        let mut harness = Harness::new(server, MemoryStore::new());
        harness.login("alice", "secret").await;

        let first = harness.controller.update(Msg::ToggleTask(milk));
        assert_eq!(first.len(), 1);
        assert!(harness.state().is_task_pending(milk));
        assert!(harness.controller.update(Msg::ToggleTask(milk)).is_empty());
        assert!(harness.controller.update(Msg::DeleteTask(milk)).is_empty());

        harness.run_effects(first).await;
        assert!(!harness.state().is_task_pending(milk));
        assert!(harness.state().tasks[0].completed);
    }

    #[tokio::test]
    async fn list_from_previous_session_is_discarded() {
        let server = alice_server();
        server.seed_task(1, "Buy milk", false);
        let mut harness = Harness::new(server, MemoryStore::new());
        harness.login("alice", "secret").await;

        let stale = harness.controller.update(Msg::Refresh);
        harness.send(Msg::Logout).await;
        harness.run_effects(stale).await;

        assert_eq!(harness.state().phase(), Phase::Unauthenticated);
        assert!(harness.state().tasks.is_empty());
    }

    #[tokio::test]
    async fn logout_clears_locally_even_when_offline() {
        let mut harness = Harness::new(alice_server(), MemoryStore::new());
        harness.login("alice", "secret").await;
        harness.server.state.borrow_mut().offline = true;

        harness.send(Msg::Logout).await;

        assert_eq!(harness.state().phase(), Phase::Unauthenticated);
        assert!(harness.storage.is_empty());
        assert_eq!(harness.last_notice(), Some("Logged out successfully"));
        assert_eq!(harness.server.requests_to(Method::POST, LOGOUT_PATH), 1);
    }

    #[tokio::test]
    async fn network_failure_on_login_is_generic() {
        let mut harness = Harness::new(alice_server(), MemoryStore::new());
        harness.server.state.borrow_mut().offline = true;
        harness.login("alice", "secret").await;

        assert_eq!(harness.last_notice(), Some(NETWORK_ERROR));
        assert_eq!(harness.state().notices.last().map(|n| n.kind), Some(NoticeKind::Error));
    }

    #[tokio::test]
    async fn notices_are_dismissed_by_id() {
        let mut harness = Harness::new(alice_server(), MemoryStore::new());
        harness.send(Msg::SubmitLogin).await;
        harness.send(Msg::SubmitRegister).await;
        assert_eq!(harness.state().notices.len(), 2);

        let Effect::DismissNotice { id, .. } = harness.timers[0].clone() else {
            panic!("expected a dismissal timer");
        };
        harness.send(Msg::DismissNotice(id)).await;

        assert_eq!(harness.state().notices.len(), 1);
        assert_eq!(
            harness.last_notice(),
            Some("Please fill in all required fields")
        );
    }
}
