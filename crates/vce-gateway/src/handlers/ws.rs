//! `GET /api/v1/vce/ws` — the conversational WebSocket (§4.8, §6).
//!
//! Mirrors the split-socket, two-task shape this gateway's voice data
//! plane uses elsewhere: a sender task drains the session's outbound
//! queue onto the socket, a reader task decodes inbound frames and drives
//! the per-turn state machine, and `tokio::select!` tears down whichever
//! side survives the other.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;
use vce_core::domain::AudioFrame;
use vce_core::events::{AudioDelta, ErrorDetail, EventEnvelope, OutboundEvent};
use vce_core::ports::{AsrCallbacks, StreamSink};

use crate::state::AppState;
use crate::wire::{AudioAppendData, ChatUpdateData, InboundEnvelope};

const DEFAULT_LANGUAGE: &str = "en";

pub async fn ws_handler(
    State(gateway): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let auth = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match gateway.authenticate(auth) {
        Ok(uid) => ws
            .on_upgrade(move |socket| handle_socket(socket, uid, gateway))
            .into_response(),
        Err(e) => {
            warn!(error = %e, "websocket upgrade rejected");
            (StatusCode::UNAUTHORIZED, e.to_string()).into_response()
        }
    }
}

/// Recognized speech events, bridged from the ASR driver's synchronous
/// callbacks into the async turn loop below.
enum AsrEvent {
    Partial(String),
    Final(String),
}

async fn handle_socket(socket: WebSocket, uid: String, gateway: AppState) {
    let session = Arc::new(gateway.build_session(uid.clone()));
    if let Err(e) = gateway.enroll(&uid, session.clone()).await {
        warn!(uid = %uid, error = %e, "failed to enroll session, closing socket");
        return;
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut outbound_rx = match session.take_receiver().await {
        Some(rx) => rx,
        None => {
            warn!(uid = %uid, "outbound receiver already taken");
            gateway.disenroll(&uid).await;
            return;
        }
    };

    let sender_uid = uid.clone();
    let mut sender_task = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(p) => p,
                Err(e) => {
                    warn!(uid = %sender_uid, error = %e, "failed to serialize outbound event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let (asr_tx, mut asr_rx) = mpsc::unbounded_channel::<AsrEvent>();
    let turn_session = session.clone();
    let turn_gateway = gateway.clone();
    let turn_uid = uid.clone();
    let language = Arc::new(tokio::sync::Mutex::new(DEFAULT_LANGUAGE.to_string()));
    let reader_language = language.clone();

    let mut reader_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(_) => break,
            };
            let text = match msg {
                Message::Text(t) => t.to_string(),
                Message::Close(_) => break,
                _ => continue,
            };

            let envelope: InboundEnvelope = match serde_json::from_str(&text) {
                Ok(e) => e,
                Err(e) => {
                    push_error(&session, "client_violation", &format!("malformed frame: {e}")).await;
                    continue;
                }
            };

            match envelope.event_type.as_str() {
                "chat.update" => {
                    let data: ChatUpdateData = match serde_json::from_value(envelope.data) {
                        Ok(d) => d,
                        Err(e) => {
                            push_error(&session, "client_violation", &format!("bad chat.update: {e}")).await;
                            continue;
                        }
                    };
                    if let Some(lang) = data
                        .chat_config
                        .parameters
                        .get("language")
                        .and_then(|v| v.as_str())
                    {
                        *reader_language.lock().await = lang.to_string();
                    }
                    on_chat_update(&session, asr_tx.clone()).await;
                }
                "input_audio_buffer.append" => {
                    let data: AudioAppendData = match serde_json::from_value(envelope.data) {
                        Ok(d) => d,
                        Err(e) => {
                            push_error(&session, "client_violation", &format!("bad audio append: {e}")).await;
                            continue;
                        }
                    };
                    on_audio_append(&session, &data.delta).await;
                }
                "input_audio_buffer.complete" => {
                    on_audio_complete(&session).await;
                }
                "conversation.chat.cancel" => {
                    on_cancel(&session).await;
                }
                other => {
                    push_error(
                        &session,
                        "client_violation",
                        &format!("unknown event_type `{other}`"),
                    )
                    .await;
                }
            }
        }
    });

    let turn_loop = tokio::spawn(async move {
        while let Some(event) = asr_rx.recv().await {
            match event {
                AsrEvent::Partial(text) => {
                    push_event(
                        &turn_session,
                        OutboundEvent::ConversationAudioTranscriptUpdate { text },
                    )
                    .await;
                }
                AsrEvent::Final(text) => {
                    push_event(
                        &turn_session,
                        OutboundEvent::ConversationAudioTranscriptCompleted { text: text.clone() },
                    )
                    .await;
                    if text.trim().is_empty() {
                        continue;
                    }
                    let lang = language.lock().await.clone();
                    run_turn(&turn_gateway, &turn_session, &turn_uid, &lang, text).await;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut sender_task => { reader_task.abort(); turn_loop.abort(); }
        _ = &mut reader_task => { sender_task.abort(); turn_loop.abort(); }
    }

    gateway.disenroll(&uid).await;
    info!(uid = %uid, "websocket session closed");
}

async fn push_event(session: &Arc<crate::session::Session>, data: OutboundEvent) {
    session
        .push_event(EventEnvelope::new(Uuid::new_v4().to_string(), "log", data))
        .await;
}

async fn push_error(session: &Arc<crate::session::Session>, code: &str, message: &str) {
    warn!(uid = %session.uid, code, message, "client violation");
    push_event(
        session,
        OutboundEvent::Error(ErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
        }),
    )
    .await;
}

/// On `chat.update`: register ASR callbacks that push recognized text
/// onto `asr_tx`, register a TTS audio callback that pushes audio deltas
/// straight onto the outbound queue, reset VAD, and start a fresh ASR
/// request (§4.8).
async fn on_chat_update(session: &Arc<crate::session::Session>, asr_tx: mpsc::UnboundedSender<AsrEvent>) {
    if let Some(vad) = session.vad.lock().await.as_mut() {
        vad.reset();
    }

    if let Some(asr) = session.asr.lock().await.as_mut() {
        let partial_tx = asr_tx.clone();
        let final_tx = asr_tx;
        asr.set_callbacks(AsrCallbacks {
            on_partial: Box::new(move |text| {
                let _ = partial_tx.send(AsrEvent::Partial(text));
            }),
            on_final: Box::new(move |text| {
                let _ = final_tx.send(AsrEvent::Final(text));
            }),
        });
        if let Err(e) = asr.stream_start().await {
            warn!(uid = %session.uid, error = %e, "failed to start ASR stream");
        }
    }

    if let Some(tts) = session.tts.lock().await.as_mut() {
        let (audio_tx, mut audio_rx) = mpsc::unbounded_channel::<Option<Vec<u8>>>();
        tts.set_callback(Box::new(move |chunk| {
            let _ = audio_tx.send(chunk);
        }));
        // Single consumer, so chunks reach the outbound queue in the same
        // order the driver produced them (§5's TTS ordering guarantee) —
        // a callback-per-chunk spawn would let tasks race each other.
        let audio_session = session.clone();
        tokio::spawn(async move {
            while let Some(chunk) = audio_rx.recv().await {
                match chunk {
                    Some(bytes) => {
                        push_event(
                            &audio_session,
                            OutboundEvent::ConversationAudioDelta(AudioDelta {
                                delta: BASE64.encode(bytes),
                            }),
                        )
                        .await;
                    }
                    None => {
                        push_event(&audio_session, OutboundEvent::ConversationAudioCompleted).await;
                    }
                }
            }
        });
    }

    push_event(
        session,
        OutboundEvent::ChatUpdated {
            conversation_id: session.id.to_string(),
        },
    )
    .await;
}

/// On `input_audio_buffer.append`: run VAD and forward the chunk to ASR
/// concurrently (§4.8); emit a VAD event only when hysteresis flips.
async fn on_audio_append(session: &Arc<crate::session::Session>, delta_b64: &str) {
    let bytes = match BASE64.decode(delta_b64) {
        Ok(b) => b,
        Err(e) => {
            push_error(session, "client_violation", &format!("bad base64 audio: {e}")).await;
            return;
        }
    };

    let vad_changed = if let Some(frame) = AudioFrame::from_bytes(&bytes) {
        let mut guard = session.vad.lock().await;
        match guard.as_mut() {
            Some(vad) => match vad.process_frame(&frame).await {
                Ok(changed) => Some((changed, vad.is_speech_active())),
                Err(e) => {
                    warn!(uid = %session.uid, error = %e, "VAD processing failed");
                    None
                }
            },
            None => None,
        }
    } else {
        None
    };

    if let Some(asr) = session.asr.lock().await.as_mut() {
        if let Err(e) = asr.stream_append(&bytes).await {
            warn!(uid = %session.uid, error = %e, "ASR append failed");
        }
    }

    if let Some((true, speech_active)) = vad_changed {
        push_event(
            session,
            OutboundEvent::ConversationAudioTranscriptVad { speech_active },
        )
        .await;
    }
}

async fn on_audio_complete(session: &Arc<crate::session::Session>) {
    if let Some(asr) = session.asr.lock().await.as_mut() {
        if let Err(e) = asr.stream_finish().await {
            warn!(uid = %session.uid, error = %e, "ASR finish failed");
        }
    }
    push_event(session, OutboundEvent::InputAudioBufferCompleted).await;
}

/// On `conversation.chat.cancel`: stop the active LLM stream. The turn
/// loop's `query_stream` call observes the cancellation and the
/// `conversation.chat.canceled` event follows from there (§4.8, §5).
async fn on_cancel(session: &Arc<crate::session::Session>) {
    if let Some(llm) = &session.llm {
        llm.close().await;
    }
}

/// Classify intent, emit the TTS request URL, and either speak
/// `user_prompt` directly (short-circuit) or stream the LLM turn into
/// sentence-chunked TTS (§4.5, §4.8).
async fn run_turn(
    gateway: &AppState,
    session: &Arc<crate::session::Session>,
    uid: &str,
    language: &str,
    text: String,
) {
    let chat_id = format!("chat_{}", Uuid::new_v4().simple());
    push_event(session, OutboundEvent::ConversationChatCreated { chat_id: chat_id.clone() }).await;
    push_event(session, OutboundEvent::ConversationChatInProgress { chat_id: chat_id.clone() }).await;

    let intention = {
        let device_repo = gateway.device_repo.as_ref();
        gateway.intent_classifier.detect(&text, language, uid, device_repo).await
    };

    let intention = match intention {
        Ok(i) => i,
        Err(e) => {
            push_error(session, "provider_transient", &format!("intent classification failed: {e}")).await;
            push_event(
                session,
                OutboundEvent::ConversationChatCanceled {
                    chat_id,
                    error: Some(ErrorDetail {
                        code: "provider_transient".to_string(),
                        message: e.to_string(),
                    }),
                },
            )
            .await;
            return;
        }
    };

    let request_id = {
        let mut guard = session.tts.lock().await;
        match guard.as_mut() {
            Some(tts) => Some(tts.begin_request().await),
            None => None,
        }
    };
    let Some(request_id) = request_id else {
        push_error(session, "provider_fatal", "tts handle unavailable").await;
        return;
    };
    push_event(
        session,
        OutboundEvent::ConversationAudioUrl {
            content: format!("{uid}.{request_id}"),
        },
    )
    .await;

    if intention.is_short_circuited() {
        let reply = intention.user_prompt.clone().unwrap_or_default();
        if let Some(tts) = session.tts.lock().await.as_mut() {
            if let Err(e) = tts.query(&reply, true).await {
                warn!(uid = %uid, error = %e, "short-circuit TTS query failed");
            }
        }
        push_event(
            session,
            OutboundEvent::ConversationMessageCompleted {
                chat_id: chat_id.clone(),
                content: reply,
                command: intention.meta_data.clone(),
            },
        )
        .await;
        push_event(
            session,
            OutboundEvent::ConversationChatCompleted {
                chat_id,
                command: intention.meta_data,
            },
        )
        .await;
        return;
    }

    stream_llm_turn(session, chat_id, text, intention).await;
}

/// Drains sentence-chunked LLM output into TTS, preserving chunk order
/// (§5's "within one TTS request, audio chunks are delivered in
/// production order"). The LLM client's callbacks are synchronous, so
/// they only enqueue onto `chunk_tx`; this function is the async
/// consumer that actually awaits TTS and the outbound queue.
async fn stream_llm_turn(
    session: &Arc<crate::session::Session>,
    chat_id: String,
    text: String,
    intention: vce_core::domain::Intention,
) {
    let Some(llm) = session.llm.clone() else {
        push_error(session, "provider_fatal", "llm handle unavailable").await;
        return;
    };

    let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<(String, bool)>();
    let sink = StreamSink {
        on_text: Box::new(|_text| {}),
        on_chunk: {
            let tx = chunk_tx.clone();
            Box::new(move |chunk: &str, is_final: bool| {
                let _ = tx.send((chunk.to_string(), is_final));
            })
        },
        on_finish: Box::new(|_full| {}),
    };
    drop(chunk_tx);

    let consumer_session = session.clone();
    let consumer = tokio::spawn(async move {
        let mut full_reply = String::new();
        while let Some((chunk, is_final)) = chunk_rx.recv().await {
            full_reply.push_str(&chunk);
            push_event(
                &consumer_session,
                OutboundEvent::ConversationMessageDelta {
                    chat_id: chat_id.clone(),
                    content: chunk.clone(),
                },
            )
            .await;
            let mut guard = consumer_session.tts.lock().await;
            if let Some(tts) = guard.as_mut() {
                if let Err(e) = tts.query(&chunk, is_final).await {
                    warn!(error = %e, "TTS query failed mid-stream");
                }
            }
        }
        (chat_id, full_reply)
    });

    let stream_result = llm
        .query_stream(
            &text,
            intention.user_prompt.as_deref(),
            intention.system_prompt.as_deref(),
            sink,
        )
        .await;

    let (chat_id, full_reply) = match consumer.await {
        Ok(r) => r,
        Err(_) => return,
    };

    match stream_result {
        Ok(()) => {
            push_event(
                session,
                OutboundEvent::ConversationMessageCompleted {
                    chat_id: chat_id.clone(),
                    content: full_reply,
                    command: None,
                },
            )
            .await;
            push_event(session, OutboundEvent::ConversationChatCompleted { chat_id, command: None }).await;
        }
        Err(e) => {
            push_event(
                session,
                OutboundEvent::ConversationChatCanceled {
                    chat_id,
                    error: Some(ErrorDetail {
                        code: "provider_transient".to_string(),
                        message: e.to_string(),
                    }),
                },
            )
            .await;
        }
    }
}
