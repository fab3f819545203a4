#![no_main]

use kodi_ws_client::connection::Phase;
use kodi_ws_client::correlator::{interpret, Inbound};
use kodi_ws_client::protocol::{InboundMessage, Method};
use libfuzzer_sys::fuzz_target;

const LAST_ACTIONS: [Option<Method>; 6] = [
    None,
    Some(Method::PlayerOpen),
    Some(Method::PlayerStop),
    Some(Method::PlayerRotate),
    Some(Method::GetActivePlayers),
    Some(Method::ShowNotification),
];

fuzz_target!(|data: &[u8]| {
    let Ok(msg) = serde_json::from_slice::<InboundMessage>(data) else {
        return;
    };
    let inbound = Inbound::Message(msg);

    // `interpret` is total: any parsed message under any state yields an outcome.
    for last in LAST_ACTIONS {
        for current in [None, Some(0), Some(1)] {
            let _ = interpret(Phase::Connected, last, current, &inbound);
        }
    }
});
