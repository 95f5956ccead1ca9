use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dowow_core::Request;

use super::Connection;

/// A dispatch callback: receives the Connection it arrived on and owns
/// the Request, releasing it when it returns.
pub type HandlerFn = Arc<dyn Fn(&Connection, Request) + Send + Sync>;

#[derive(Default)]
pub struct HandlerTable {
    named: Mutex<HashMap<String, HandlerFn>>,
    default: Mutex<Option<HandlerFn>>,
}

impl HandlerTable {
    pub fn set_named(&self, name: impl Into<String>, handler: Option<HandlerFn>) {
        let name = name.into();
        let mut named = self.named.lock().unwrap();
        match handler {
            Some(h) => {
                named.insert(name, h);
            }
            None => {
                named.remove(&name);
            }
        }
    }

    pub fn set_default(&self, handler: Option<HandlerFn>) {
        *self.default.lock().unwrap() = handler;
    }

    pub fn named(&self, name: &str) -> Option<HandlerFn> {
        self.named.lock().unwrap().get(name).cloned()
    }

    pub fn default_handler(&self) -> Option<HandlerFn> {
        self.default.lock().unwrap().clone()
    }
}
