use chrono::{DateTime, Utc};
use sauron::{
    html::{attributes::*, *},
    prelude::*,
};
use taskdesk_shared::{
    controller::{AuthMode, LoginField, Notice, NoticeKind, RegisterField},
    view::{avatar_initial, relative_date, status_label, EMPTY_PLACEHOLDER},
    Filter, Msg, Phase, Session, Task,
};

use crate::Model;

const INPUT_CLASS: &str = "w-full px-3 py-2 bg-ctp-surface0 border border-ctp-surface2 rounded-md text-ctp-text placeholder-ctp-subtext0 focus:outline-none focus:ring-2 focus:ring-ctp-blue focus:border-transparent";
const PRIMARY_BUTTON_CLASS: &str = "w-full bg-ctp-blue hover:bg-ctp-sapphire text-ctp-base font-medium px-6 py-2 rounded-md transition-colors duration-200 disabled:opacity-50";

impl Model {
    pub(crate) fn view_root(&self) -> Node<Msg> {
        let state = self.controller.state();
        div(
            [class("min-h-screen bg-ctp-base text-ctp-text")],
            [
                self.view_notices(&state.notices),
                match (state.phase(), &state.session) {
                    (Phase::Authenticated, Some(session)) => self.view_app(session),
                    _ => self.view_auth(),
                },
            ],
        )
    }

    fn view_notices(&self, notices: &[Notice]) -> Node<Msg> {
        div(
            [class("fixed top-4 right-4 z-50 space-y-2 w-80")],
            notices.iter().map(|notice| {
                let notice_id = notice.id;
                let (icon, color) = match notice.kind {
                    NoticeKind::Success => ("✓", "bg-ctp-green/20 text-ctp-green border-ctp-green"),
                    NoticeKind::Error => ("✗", "bg-ctp-red/20 text-ctp-red border-ctp-red"),
                };
                div(
                    [
                        key(notice_id.to_string()),
                        class(&format!("flex items-center gap-3 px-4 py-3 rounded-lg border shadow-lg cursor-pointer {}", color)),
                        on_click(move |_| Msg::DismissNotice(notice_id)),
                    ],
                    [span([], [text(icon)]), span([], [text(&notice.message)])],
                )
            }).collect::<Vec<_>>(),
        )
    }

    fn view_auth(&self) -> Node<Msg> {
        let state = self.controller.state();
        div([class("max-w-md mx-auto px-6 py-16")], [
            h1([class("text-3xl font-bold text-ctp-text text-center mb-8")], [text("My Tasks")]),
            div([class("bg-ctp-surface0 rounded-lg shadow-lg p-8 border border-ctp-surface1")], [
                match state.auth_mode {
                    AuthMode::Login => self.view_login_form(),
                    AuthMode::Register => self.view_register_form(),
                },
            ]),
        ])
    }

    fn view_login_form(&self) -> Node<Msg> {
        let state = self.controller.state();
        let form = &state.login_form;
        let busy = state.pending.login;
        div([class("space-y-4")], [
            h2([class("text-xl font-semibold text-ctp-text mb-4")], [text("Login")]),
            input([
                r#type("text"),
                placeholder("Username"),
                value(&form.username),
                on_input(|event| Msg::EditLogin(LoginField::Username, event.value())),
                class(INPUT_CLASS),
            ], []),
            input([
                r#type("password"),
                placeholder("Password"),
                value(&form.password),
                on_input(|event| Msg::EditLogin(LoginField::Password, event.value())),
                class(INPUT_CLASS),
            ], []),
            button([
                on_click(|_| Msg::SubmitLogin),
                class(PRIMARY_BUTTON_CLASS),
                disabled(busy),
            ], [text(if busy { "Loading..." } else { "Login" })]),
            p([class("text-sm text-ctp-subtext0 text-center")], [
                text("Don't have an account? "),
                a([
                    href("#"),
                    on_click(|event| {
                        event.prevent_default();
                        Msg::ShowRegister
                    }),
                    class("text-ctp-blue hover:underline"),
                ], [text("Register")]),
            ]),
        ])
    }

    fn view_register_form(&self) -> Node<Msg> {
        let state = self.controller.state();
        let form = &state.register_form;
        let busy = state.pending.register;
        let field = |kind: RegisterField, input_type: &str, hint: &str, current: &str| {
            input([
                r#type(input_type.to_string()),
                placeholder(hint.to_string()),
                value(current.to_string()),
                on_input(move |event| Msg::EditRegister(kind, event.value())),
                class(INPUT_CLASS),
            ], [])
        };
        div([class("space-y-4")], [
            h2([class("text-xl font-semibold text-ctp-text mb-4")], [text("Create an account")]),
            field(RegisterField::Username, "text", "Username", &form.username),
            field(RegisterField::Email, "email", "Email", &form.email),
            div([class("grid grid-cols-2 gap-4")], [
                field(RegisterField::FirstName, "text", "First name (optional)", &form.first_name),
                field(RegisterField::LastName, "text", "Last name (optional)", &form.last_name),
            ]),
            field(RegisterField::Password, "password", "Password", &form.password),
            field(RegisterField::Password2, "password", "Confirm password", &form.password2),
            button([
                on_click(|_| Msg::SubmitRegister),
                class(PRIMARY_BUTTON_CLASS),
                disabled(busy),
            ], [text(if busy { "Loading..." } else { "Register" })]),
            p([class("text-sm text-ctp-subtext0 text-center")], [
                text("Already have an account? "),
                a([
                    href("#"),
                    on_click(|event| {
                        event.prevent_default();
                        Msg::ShowLogin
                    }),
                    class("text-ctp-blue hover:underline"),
                ], [text("Login")]),
            ]),
        ])
    }

    fn view_app(&self, session: &Session) -> Node<Msg> {
        div([], [
            self.view_header(session),
            div([class("max-w-4xl mx-auto px-6 py-8 space-y-8")], [
                self.view_stats(),
                self.view_create_form(),
                self.view_controls(),
                self.view_task_list(),
            ]),
        ])
    }

    fn view_header(&self, session: &Session) -> Node<Msg> {
        let user = &session.user;
        header([class("bg-ctp-mantle shadow-lg border-b border-ctp-surface0")], [
            div([class("max-w-4xl mx-auto px-6 py-4 flex items-center justify-between")], [
                h1([class("text-2xl font-bold text-ctp-text")], [text("My Tasks")]),
                div([class("flex items-center gap-4")], [
                    div([class("w-10 h-10 rounded-full bg-ctp-blue text-ctp-base flex items-center justify-center font-bold")], [
                        text(avatar_initial(&user.username)),
                    ]),
                    div([], [
                        p([class("font-medium text-ctp-text")], [text(&user.username)]),
                        p([class("text-sm text-ctp-subtext0")], [text(&user.email)]),
                    ]),
                    button([
                        on_click(|_| Msg::Logout),
                        class("bg-ctp-surface1 hover:bg-ctp-surface2 text-ctp-text px-4 py-2 rounded-md transition-colors duration-200"),
                    ], [text("Logout")]),
                ]),
            ]),
        ])
    }

    fn view_stats(&self) -> Node<Msg> {
        let stats = self.controller.state().stats();
        div([class("grid grid-cols-3 gap-6")], [
            self.stat_card("Total", stats.total, "📝"),
            self.stat_card("Active", stats.active, "⏳"),
            self.stat_card("Completed", stats.completed, "✅"),
        ])
    }

    fn stat_card(&self, card_title: &str, count: usize, icon: &str) -> Node<Msg> {
        div([class("bg-ctp-surface0 rounded-lg p-6 border border-ctp-surface1")], [
            div([class("flex items-center justify-between")], [
                div([], [
                    p([class("text-sm font-medium text-ctp-subtext0")], [text(card_title)]),
                    p([class("text-2xl font-bold text-ctp-text mt-1")], [text(count)]),
                ]),
                span([class("text-3xl")], [text(icon)]),
            ]),
        ])
    }

    fn view_create_form(&self) -> Node<Msg> {
        let state = self.controller.state();
        let busy = state.pending.create;
        div([class("p-6 bg-ctp-surface0 rounded-lg border border-ctp-surface1")], [
            h2([class("text-xl font-semibold text-ctp-text mb-4 pb-2 border-b border-ctp-surface2")], [text("Add New Task")]),
            div([class("space-y-4")], [
                input([
                    r#type("text"),
                    placeholder("Task title"),
                    value(&state.new_task.title),
                    on_input(|event| Msg::SetNewTaskTitle(event.value())),
                    class(INPUT_CLASS),
                ], []),
                textarea([
                    placeholder("Description (optional)"),
                    value(&state.new_task.description),
                    on_input(|event| Msg::SetNewTaskDescription(event.value())),
                    class(&format!("{} h-20 resize-y", INPUT_CLASS)),
                ], []),
                button([
                    on_click(|_| Msg::CreateTask),
                    class("bg-ctp-blue hover:bg-ctp-sapphire text-ctp-base font-medium px-6 py-2 rounded-md transition-colors duration-200 disabled:opacity-50"),
                    disabled(busy),
                ], [text(if busy { "Loading..." } else { "+ Add Task" })]),
            ]),
        ])
    }

    fn view_controls(&self) -> Node<Msg> {
        let state = self.controller.state();
        div([class("flex flex-wrap items-center justify-between gap-4")], [
            div(
                [class("flex gap-2")],
                Filter::ALL.iter().map(|&filter| {
                    let is_active = state.filter == filter;
                    button([
                        on_click(move |_| Msg::SetFilter(filter)),
                        class(&format!(
                            "px-4 py-2 rounded-md text-sm font-medium transition-colors duration-200 {}",
                            if is_active {
                                "bg-ctp-blue text-ctp-base"
                            } else {
                                "bg-ctp-surface0 text-ctp-subtext0 hover:text-ctp-text hover:bg-ctp-surface1"
                            }
                        )),
                    ], [text(filter.label())])
                }).collect::<Vec<_>>(),
            ),
            div([class("flex gap-2")], [
                input([
                    r#type("search"),
                    placeholder("Search tasks..."),
                    value(&state.search),
                    on_input(|event| Msg::SetSearch(event.value())),
                    class("px-3 py-2 bg-ctp-surface0 border border-ctp-surface2 rounded-md text-ctp-text placeholder-ctp-subtext0 focus:outline-none focus:ring-2 focus:ring-ctp-blue"),
                ], []),
                button([
                    on_click(|_| Msg::Refresh),
                    disabled(state.loading),
                    class("px-4 py-2 rounded-md text-sm font-medium bg-ctp-surface0 text-ctp-subtext0 hover:text-ctp-text hover:bg-ctp-surface1 transition-colors duration-200 disabled:opacity-50"),
                ], [text(if state.loading { "Loading..." } else { "↻ Refresh" })]),
            ]),
        ])
    }

    fn view_task_list(&self) -> Node<Msg> {
        let state = self.controller.state();
        if state.loading && state.tasks.is_empty() {
            return div([class("text-center py-10 text-ctp-subtext0 italic")], [text("Loading...")]);
        }

        let visible = state.visible_tasks();
        if visible.is_empty() {
            return div([class("text-center py-12")], [
                div([class("text-ctp-overlay0 text-6xl mb-4")], [text("📝")]),
                p([class("text-ctp-subtext0")], [text(EMPTY_PLACEHOLDER)]),
            ]);
        }

        let now = Utc::now();
        div(
            [class("space-y-4")],
            visible.into_iter().map(|task| self.view_task(task, now)).collect::<Vec<_>>(),
        )
    }

    fn view_task(&self, task: &Task, now: DateTime<Utc>) -> Node<Msg> {
        let is_pending = self.controller.state().is_task_pending(task.id);
        let task_id = task.id;

        div(
            [key(task.id.to_string()),
            class(&format!(
                "group border rounded-xl p-6 bg-ctp-surface0 shadow-sm transition-all duration-300 hover:shadow-lg {}",
                if task.completed {
                    "border-ctp-green bg-ctp-green/10"
                } else {
                    "border-ctp-surface1 hover:border-ctp-blue"
                }
            ))],
            [div([class("flex items-start gap-4")], [
                div([class("flex-shrink-0 pt-1")], [
                    label([class("relative flex items-center cursor-pointer")], [
                        input([
                            r#type("checkbox"),
                            checked(task.completed),
                            id(&format!("checkbox-{}", task.id)),
                            on_click(move |_| Msg::ToggleTask(task_id)),
                            class("sr-only"),
                            disabled(is_pending),
                        ], []),
                        div([class(&format!(
                            "w-6 h-6 rounded-lg border-2 flex items-center justify-center transition-all duration-200 {}",
                            if task.completed {
                                "bg-ctp-green border-ctp-green shadow-sm"
                            } else {
                                "border-ctp-surface2 hover:border-ctp-blue hover:bg-ctp-blue/10"
                            }
                        ))], [
                            if is_pending {
                                span([class("animate-spin text-ctp-blue")], [text("◐")])
                            } else if task.completed {
                                span([class("text-ctp-base text-sm font-bold")], [text("✓")])
                            } else {
                                span([], [])
                            }
                        ]),
                    ]),
                ]),

                div([class("flex-1 min-w-0")], [
                    h3([class(&format!(
                        "text-lg font-semibold mb-2 {}",
                        if task.completed { "line-through text-ctp-overlay1" } else { "text-ctp-text" }
                    ))], [text(&task.title)]),
                    match task.description() {
                        Some(description) => p([class("text-sm leading-relaxed break-words text-ctp-subtext1")], [text(description)]),
                        None => span([], []),
                    },
                    div([class("mt-3 flex gap-4 text-xs text-ctp-subtext0")], [
                        span([], [text(format!("📅 {}", relative_date(task.created_at, now)))]),
                        span([], [text(if task.completed {
                            format!("✓ {}", status_label(task))
                        } else {
                            format!("⏳ {}", status_label(task))
                        })]),
                    ]),
                ]),

                div([class("flex-shrink-0")], [
                    button([
                        on_click(move |_| Msg::DeleteTask(task_id)),
                        class("inline-flex items-center justify-center w-8 h-8 rounded-lg bg-ctp-red/20 text-ctp-red hover:bg-ctp-red/30 transition-colors duration-200"),
                        r#type("button"),
                        disabled(is_pending),
                    ], [span([class("text-sm")], [text(if is_pending { "⏳" } else { "🗑️" })])]),
                ]),
            ])],
        )
    }
}
