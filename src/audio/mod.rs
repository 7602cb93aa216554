use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio_api::AudioCommand;

mod convolver;
mod effect;
mod engine;
mod frame;
mod sample_buffer;
mod sample_id;
mod voice;

pub use convolver::{ConvolutionKernel, ImpulseResponse, PreparedKernel};
pub use engine::{Engine, Retired, MASTER_GAIN, SAMPLE_GAIN};
pub use frame::StereoFrame;
pub use sample_buffer::SampleBuffer;
pub use sample_id::SampleId;
pub use voice::{Waveform, SYNTH_FLOOR_GAIN, SYNTH_PEAK_GAIN};

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    pub fn send(&self, cmd: AudioCommand) {
        // never block the ui; a full queue drops the command
        if self.tx.try_send(cmd).is_err() {
            log::warn!("audio command queue full, dropping a command");
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);
    let retired_tx = spawn_reaper()?;

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;
    log::info!("audio output: {channels} channels at {sample_rate} Hz");

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let output_stream = build_output_stream_f32(&device, &config.into(), rx, retired_tx, sample_rate, channels)?;
            output_stream.play().context("failed to play output stream")?;

            Ok(AudioHandle { tx, sample_rate, _output_stream: output_stream })
        }
        other => anyhow::bail!("unsupported sample format {other:?} (only f32 supported for now)"),
    }
}

// Whatever the engine lets go of is dropped here, not in the callback.
fn spawn_reaper() -> anyhow::Result<Sender<Retired>> {
    let (tx, rx) = crossbeam_channel::bounded::<Retired>(256);
    std::thread::Builder::new()
        .name("zoundboard-reaper".into())
        .spawn(move || for _item in rx {})
        .context("could not start the reaper thread")?;
    Ok(tx)
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    retired_tx: Sender<Retired>,
    sample_rate: u32,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut engine = Engine::new(sample_rate).with_retired(retired_tx);
    let mut scratch: Vec<StereoFrame> = vec![StereoFrame::zero(); 4096];

    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels.max(1);
            if channels == 2 {
                let frames: &mut [StereoFrame] = unsafe {
                    // StereoFrame is repr(C) with two f32s, same layout as an interleaved pair
                    std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut StereoFrame, n_frames)
                };
                engine.render_block(frames);
                return;
            }

            // anything else goes through the scratch buffer
            if scratch.len() < n_frames {
                scratch.resize(n_frames, StereoFrame::zero());
            }
            let frames = &mut scratch[..n_frames];
            engine.render_block(frames);
            for (out, f) in data.chunks_exact_mut(channels.max(1)).zip(frames.iter()) {
                match out {
                    [mono] => *mono = (f.left + f.right) * 0.5,
                    [l, r, rest @ ..] => {
                        *l = f.left;
                        *r = f.right;
                        rest.fill(0.0);
                    }
                    [] => {}
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
