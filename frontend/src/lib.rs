use gloo_timers::future::TimeoutFuture;
use sauron::prelude::*;
use taskdesk_shared::{
    session::SessionStore, ApiClient, ClientConfig, Controller, Effect, Msg,
};
use tracing::{debug, info};
use web_sys::window;

mod logging;
pub mod storage;
pub mod transport;
mod view;

use storage::LocalStorage;
use transport::FetchTransport;

const CONFIRM_DELETE: &str = "Are you sure you want to delete this task?";

pub struct Model {
    controller: Controller<LocalStorage>,
    client: ApiClient<FetchTransport>,
}

impl Model {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            controller: Controller::new(SessionStore::new(LocalStorage), config),
            client: ApiClient::new(config, FetchTransport),
        }
    }

    fn run(&self, effects: Vec<Effect>) -> Cmd<Msg> {
        if effects.is_empty() {
            return Cmd::none();
        }
        Cmd::batch(
            effects
                .into_iter()
                .map(|effect| self.command(effect))
                .collect::<Vec<_>>(),
        )
    }

    fn command(&self, effect: Effect) -> Cmd<Msg> {
        match effect {
            Effect::Call(call) => {
                debug!(call = call.name(), "dispatching api call");
                let client = self.client.clone();
                Cmd::new(async move { call.perform(&client).await })
            }
            Effect::DismissNotice { id, after_ms } => Cmd::new(async move {
                TimeoutFuture::new(after_ms).await;
                Msg::DismissNotice(id)
            }),
        }
    }
}

impl Application for Model {
    type MSG = Msg;

    fn init(&mut self) -> Cmd<Msg> {
        let effects = self.controller.start();
        self.run(effects)
    }

    fn update(&mut self, msg: Msg) -> Cmd<Msg> {
        if let Msg::DeleteTask(_) = msg {
            let confirmed = window()
                .and_then(|window| window.confirm_with_message(CONFIRM_DELETE).ok())
                .unwrap_or(false);
            if !confirmed {
                return Cmd::none();
            }
        }
        let effects = self.controller.update(msg);
        self.run(effects)
    }

    fn view(&self) -> Node<Msg> {
        self.view_root()
    }
}

fn compile_time_env(key: &str) -> Option<String> {
    let value = match key {
        "TASKDESK_API_BASE_URL" => option_env!("TASKDESK_API_BASE_URL"),
        "TASKDESK_AUTH_SCHEME" => option_env!("TASKDESK_AUTH_SCHEME"),
        "TASKDESK_NOTICE_TTL_MS" => option_env!("TASKDESK_NOTICE_TTL_MS"),
        "TASKDESK_LOG" => option_env!("TASKDESK_LOG"),
        _ => None,
    };
    value.map(str::to_string)
}

#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    let config = ClientConfig::load(compile_time_env);
    logging::init(&config.log_filter);
    info!(api = %config.api_base_url, "starting taskdesk");
    Program::mount_to_body(Model::new(&config));
}
