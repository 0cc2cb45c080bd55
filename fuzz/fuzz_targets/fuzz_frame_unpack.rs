#![no_main]

use libfuzzer_sys::fuzz_target;
use milli_h2::frame;

fuzz_target!(|data: &[u8]| {
    // Frame unpacking must never panic, whatever the bytes. It may return
    // Ok or Err, and the compression contexts may poison themselves.
    if data.len() < frame::FRAME_HEAD_LENGTH {
        let _ = frame::unpack_frame_hd(data);
        return;
    }
    let (head, payload) = data.split_at(frame::FRAME_HEAD_LENGTH);
    let _ = frame::unpack_frame_hd(head);
    let _ = frame::is_data_frame(head);
    let _ = frame::nv_offset(head);

    match head[2] {
        frame::FRAME_HEADERS => {
            let mut inflater = milli_h2::Context::inflater(milli_h2::Side::Server);
            let _ = frame::unpack_headers_without_nv(head, payload);
            let _ = frame::unpack_headers(head, payload, &mut inflater);
        }
        frame::FRAME_PRIORITY => {
            let _ = frame::unpack_priority(head, payload);
        }
        frame::FRAME_RST_STREAM => {
            let _ = frame::unpack_rst_stream(head, payload);
        }
        frame::FRAME_SETTINGS => {
            if let Ok(settings) = frame::unpack_settings(head, payload) {
                let _ = frame::settings_check_duplicate(&settings.iv);
            }
        }
        frame::FRAME_PUSH_PROMISE => {
            let mut inflater = milli_h2::Context::inflater(milli_h2::Side::Client);
            let _ = frame::unpack_push_promise_without_nv(head, payload);
            let _ = frame::unpack_push_promise(head, payload, &mut inflater);
        }
        frame::FRAME_PING => {
            let _ = frame::unpack_ping(head, payload);
        }
        frame::FRAME_GOAWAY => {
            let _ = frame::unpack_goaway(head, payload);
        }
        frame::FRAME_WINDOW_UPDATE => {
            let _ = frame::unpack_window_update(head, payload);
        }
        _ => {}
    }
});
