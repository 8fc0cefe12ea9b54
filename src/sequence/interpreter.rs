//! Sequence/channel command interpreter
//!
//! Dispatch is purely on the opcode:
//!
//! | opcode          | group             | requirement                                 |
//! |-----------------|-------------------|---------------------------------------------|
//! | `0xF0..=0xFF`   | global            | none; ends the current batch                |
//! | `0x80..=0xEF`   | player management | `target < player_count`                     |
//! | `0x40..=0x7F`   | player parameter  | `target < player_count`                     |
//! | `0x00..=0x3F`   | channel           | player enabled, `arg2 < 16`, channel exists |
//!
//! Opcodes with no handler inside their group are padding and are ignored.

use std::ops::ControlFlow;

use super::{ChannelChanges, PlayerState, SequencePlayer, SequencerState, CHANNELS_PER_PLAYER, TATUMS_PER_BEAT};
use crate::command::queue::DrainSummary;
use crate::command::{op, AudioCmd, CommandRing, PublishRange};

/// Whether interpretation of the current batch goes on after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Keep going with the next command
    Continue,
    /// A global command was applied; drop the rest of the batch
    EndBatch,
}

/// Sequence loading and host-specific actions the interpreter delegates.
///
/// The defaults only touch the player state the interpreter can see, which
/// is enough for hosts that do not stream sequence data.
pub trait SequenceHost {
    /// Start fetching sequence `seq_id` into the cache
    fn preload_sequence(&mut self, seq_id: u8, flags: u8) {
        log::trace!(target: "audio::cmd", "preload sequence {seq_id} (flags {flags:#x})");
    }

    /// Load sequence `seq_id` onto `player` and start it
    fn load_sequence(&mut self, player_index: u8, player: &mut SequencePlayer, seq_id: u8, arg3: u8) {
        log::trace!(target: "audio::cmd", "player {player_index}: load sequence {seq_id} ({arg3})");
        player.enabled = true;
        player.state = PlayerState::Playing;
    }

    /// Stop `player` immediately
    fn disable_player(&mut self, player_index: u8, player: &mut SequencePlayer) {
        log::trace!(target: "audio::cmd", "player {player_index}: disable");
        player.disable();
    }

    /// Host-defined action bound to opcode `0xF3`
    fn triggered_action(&mut self, target: u8, arg2: u8, arg3: u8) {
        log::trace!(target: "audio::cmd", "triggered action {target} {arg2} {arg3}");
    }
}

impl SequencerState {
    /// Drain one published range from `ring`, applying each command.
    ///
    /// Stops early at the first global command.
    pub fn process_batch<H: SequenceHost + ?Sized>(
        &mut self,
        ring: &CommandRing,
        range: PublishRange,
        host: &mut H,
    ) -> DrainSummary {
        let summary = ring.drain(range, |cmd| match self.apply(cmd, host) {
            Dispatch::Continue => ControlFlow::Continue(()),
            Dispatch::EndBatch => ControlFlow::Break(()),
        });
        if summary.skipped > 0 {
            log::debug!(
                target: "audio::cmd",
                "global command ended batch early, {} commands skipped",
                summary.skipped
            );
        }
        summary
    }

    /// Apply a single command
    pub fn apply<H: SequenceHost + ?Sized>(&mut self, cmd: AudioCmd, host: &mut H) -> Dispatch {
        if cmd.is_global() {
            self.apply_global(cmd, host);
            return Dispatch::EndBatch;
        }

        let target = cmd.target as usize;
        if target >= self.players.len() {
            log::trace!(target: "audio::cmd", "op {:#04x}: no player {}", cmd.op, target);
            return Dispatch::Continue;
        }

        if cmd.op & 0x80 != 0 {
            self.apply_player_management(cmd, host);
        } else if cmd.op & 0x40 != 0 {
            self.apply_player_parameter(cmd);
        } else {
            self.apply_channel(cmd);
        }
        Dispatch::Continue
    }

    fn apply_global<H: SequenceHost + ?Sized>(&mut self, cmd: AudioCmd, host: &mut H) {
        match cmd.op {
            op::SOUND_MODE => self.sound_mode = cmd.payload.as_s32(),
            op::MUTE_ALL => {
                for player in &mut self.players {
                    player.muted = true;
                    player.recalculate_volume = true;
                }
            }
            op::UNMUTE_ALL => {
                for player in &mut self.players {
                    player.muted = false;
                    player.recalculate_volume = true;
                }
            }
            op::TRIGGER_ACTION => host.triggered_action(cmd.target, cmd.arg2, cmd.arg3),
            other => log::trace!(target: "audio::cmd", "ignoring global op {other:#04x}"),
        }
    }

    fn apply_player_management<H: SequenceHost + ?Sized>(&mut self, cmd: AudioCmd, host: &mut H) {
        let target = cmd.target as usize;
        match cmd.op {
            op::PRELOAD_SEQUENCE => host.preload_sequence(cmd.arg2, 3),
            op::LOAD_SEQUENCE | op::LOAD_SEQUENCE_ALT => {
                host.load_sequence(cmd.target, &mut self.players[target], cmd.arg2, cmd.arg3);
                self.fade_in(target, cmd.payload.as_s32());
            }
            op::STOP_SEQUENCE => {
                if self.players[target].enabled {
                    let frames = cmd.payload.as_s32();
                    if frames == 0 {
                        host.disable_player(cmd.target, &mut self.players[target]);
                    } else {
                        self.fade_to_zero(target, frames);
                    }
                }
            }
            other => log::trace!(target: "audio::cmd", "ignoring player op {other:#04x}"),
        }
    }

    fn apply_player_parameter(&mut self, cmd: AudioCmd) {
        let player = &mut self.players[cmd.target as usize];
        match cmd.op {
            op::PLAYER_FADE_VOLUME_SCALE => {
                player.fade_volume_scale = cmd.payload.as_f32();
                player.recalculate_volume = true;
            }
            op::PLAYER_TEMPO => {
                player.tempo = cmd.payload.as_s32().wrapping_mul(TATUMS_PER_BEAT) as u16;
            }
            op::PLAYER_TRANSPOSITION => player.transposition = cmd.payload.as_s8() as i16,
            op::PLAYER_VARIATION => {
                if let Some(slot) = player.variation.get_mut(cmd.arg3 as usize) {
                    *slot = cmd.payload.as_s8();
                }
            }
            other => log::trace!(target: "audio::cmd", "ignoring parameter op {other:#04x}"),
        }
    }

    fn apply_channel(&mut self, cmd: AudioCmd) {
        let player = &mut self.players[cmd.target as usize];
        if !player.enabled || cmd.arg2 as usize >= CHANNELS_PER_PLAYER {
            return;
        }
        let Some(chan) = player.channel_mut(cmd.arg2 as usize) else {
            return;
        };

        match cmd.op {
            op::CHANNEL_VOLUME_SCALE => {
                chan.volume_scale = cmd.payload.as_f32();
                chan.changes |= ChannelChanges::VOLUME;
            }
            op::CHANNEL_VOLUME => {
                chan.volume = cmd.payload.as_f32();
                chan.changes |= ChannelChanges::VOLUME;
            }
            op::CHANNEL_PAN => {
                chan.pan = cmd.payload.as_s8() as u8;
                chan.changes |= ChannelChanges::PAN;
            }
            op::CHANNEL_FREQ_SCALE => {
                chan.freq_scale = cmd.payload.as_f32();
                chan.changes |= ChannelChanges::FREQ_SCALE;
            }
            op::CHANNEL_REVERB_VOLUME => chan.reverb_volume = cmd.payload.as_s8() as u8,
            op::CHANNEL_SCRIPT_IO => {
                if let Some(slot) = chan.script_io.get_mut(cmd.arg3 as usize) {
                    *slot = cmd.payload.as_s8();
                }
            }
            op::CHANNEL_STOP => chan.stop_flag = cmd.payload.as_s8(),
            _ => {}
        }
    }

    /// Ramp player `target` linearly to silence over `frames` frames.
    ///
    /// A zero duration is treated as one frame.
    pub fn fade_to_zero(&mut self, target: usize, frames: i32) {
        let frames = if frames == 0 { 1 } else { frames };
        let Some(player) = self.players.get_mut(target) else {
            return;
        };
        player.state = PlayerState::FadingOut;
        player.fade_remaining_frames = frames;
        player.fade_velocity = -(player.fade_volume / frames as f32);
    }

    /// Start a fade-in of `frames` frames on player `target`.
    ///
    /// A zero duration leaves the player untouched.
    pub fn fade_in(&mut self, target: usize, frames: i32) {
        if frames == 0 {
            return;
        }
        let Some(player) = self.players.get_mut(target) else {
            return;
        };
        player.state = PlayerState::FadingIn;
        player.fade_timer = frames;
        player.fade_remaining_frames = frames;
        player.fade_volume = 0.0;
        player.fade_velocity = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CmdPayload;
    use approx::assert_relative_eq;

    struct NoHost;
    impl SequenceHost for NoHost {}

    #[derive(Default)]
    struct RecordingHost {
        preloads: Vec<(u8, u8)>,
        actions: Vec<(u8, u8, u8)>,
    }

    impl SequenceHost for RecordingHost {
        fn preload_sequence(&mut self, seq_id: u8, flags: u8) {
            self.preloads.push((seq_id, flags));
        }

        fn triggered_action(&mut self, target: u8, arg2: u8, arg3: u8) {
            self.actions.push((target, arg2, arg3));
        }
    }

    fn enabled_state() -> SequencerState {
        let mut state = SequencerState::new(4);
        for player in &mut state.players {
            player.enabled = true;
        }
        state
    }

    fn cmd_f32(op: u8, target: u8, arg2: u8, value: f32) -> AudioCmd {
        AudioCmd::new(op, target, arg2, 0, CmdPayload::from_f32(value))
    }

    #[test]
    fn test_fade_to_zero_velocity() {
        let mut state = SequencerState::new(4);
        state.players[1].fade_volume = 100.0;
        state.fade_to_zero(1, 10);
        let player = &state.players[1];
        assert_eq!(player.state, PlayerState::FadingOut);
        assert_eq!(player.fade_remaining_frames, 10);
        assert_relative_eq!(player.fade_velocity, -10.0);
    }

    #[test]
    fn test_fade_to_zero_duration_floor() {
        let mut a = SequencerState::new(2);
        let mut b = SequencerState::new(2);
        a.players[0].fade_volume = 0.8;
        b.players[0].fade_volume = 0.8;
        a.fade_to_zero(0, 0);
        b.fade_to_zero(0, 1);
        assert_eq!(a, b);
        assert_relative_eq!(a.players[0].fade_velocity, -0.8);
    }

    #[test]
    fn test_fade_in_zero_is_noop() {
        let mut state = SequencerState::new(2);
        let before = state.clone();
        state.fade_in(0, 0);
        assert_eq!(state, before);
    }

    #[test]
    fn test_fade_in_resets_volume() {
        let mut state = SequencerState::new(2);
        state.players[0].fade_velocity = 0.3;
        state.fade_in(0, 30);
        let player = &state.players[0];
        assert_eq!(player.state, PlayerState::FadingIn);
        assert_eq!(player.fade_timer, 30);
        assert_eq!(player.fade_remaining_frames, 30);
        assert_eq!(player.fade_volume, 0.0);
        assert_eq!(player.fade_velocity, 0.0);
    }

    #[test]
    fn test_channel_ops_set_dirty_bits() {
        let mut state = enabled_state();
        state.apply(cmd_f32(op::CHANNEL_VOLUME, 0, 3, 0.25), &mut NoHost);
        state.apply(AudioCmd::new(op::CHANNEL_PAN, 0, 4, 0, CmdPayload::from_s8(20)), &mut NoHost);
        state.apply(cmd_f32(op::CHANNEL_FREQ_SCALE, 0, 5, 1.5), &mut NoHost);
        state.apply(AudioCmd::new(op::CHANNEL_REVERB_VOLUME, 0, 6, 0, CmdPayload::from_s8(90)), &mut NoHost);

        let player = &state.players[0];
        assert_relative_eq!(player.channel(3).unwrap().volume, 0.25);
        assert_eq!(player.channel(3).unwrap().changes, ChannelChanges::VOLUME);
        assert_eq!(player.channel(4).unwrap().pan, 20);
        assert_eq!(player.channel(4).unwrap().changes, ChannelChanges::PAN);
        assert_relative_eq!(player.channel(5).unwrap().freq_scale, 1.5);
        assert_eq!(player.channel(5).unwrap().changes, ChannelChanges::FREQ_SCALE);
        assert_eq!(player.channel(6).unwrap().reverb_volume, 90);
        assert!(player.channel(6).unwrap().changes.is_empty());
    }

    #[test]
    fn test_channel_ops_require_enabled_player() {
        let mut state = SequencerState::new(4);
        state.apply(cmd_f32(op::CHANNEL_VOLUME, 0, 3, 0.25), &mut NoHost);
        assert_relative_eq!(state.players[0].channel(3).unwrap().volume, 1.0);
    }

    #[test]
    fn test_channel_ops_skip_missing_channel() {
        let mut state = enabled_state();
        state.players[0].channels[2] = None;
        state.apply(cmd_f32(op::CHANNEL_VOLUME, 0, 2, 0.1), &mut NoHost);
        state.apply(cmd_f32(op::CHANNEL_VOLUME, 0, 16, 0.1), &mut NoHost);
        assert!(state.players[0].channel(2).is_none());
    }

    #[test]
    fn test_script_io_index_bound() {
        let mut state = enabled_state();
        state.apply(AudioCmd::new(op::CHANNEL_SCRIPT_IO, 1, 0, 7, CmdPayload::from_s8(5)), &mut NoHost);
        state.apply(AudioCmd::new(op::CHANNEL_SCRIPT_IO, 1, 0, 8, CmdPayload::from_s8(9)), &mut NoHost);
        let chan = state.players[1].channel(0).unwrap();
        assert_eq!(chan.script_io[7], 5);
        assert!(!chan.script_io.contains(&9));
    }

    #[test]
    fn test_player_parameters() {
        let mut state = SequencerState::new(4);
        state.apply(AudioCmd::new(op::PLAYER_TEMPO, 2, 0, 0, CmdPayload::from_s32(100)), &mut NoHost);
        state.apply(AudioCmd::new(op::PLAYER_TRANSPOSITION, 2, 0, 0, CmdPayload::from_s8(-3)), &mut NoHost);
        state.apply(AudioCmd::new(op::PLAYER_VARIATION, 2, 0, 1, CmdPayload::from_s8(4)), &mut NoHost);
        state.apply(cmd_f32(op::PLAYER_FADE_VOLUME_SCALE, 2, 0, 0.5), &mut NoHost);

        let player = &state.players[2];
        assert_eq!(player.tempo, 4800);
        assert_eq!(player.transposition, -3);
        assert_eq!(player.variation[1], 4);
        assert_relative_eq!(player.fade_volume_scale, 0.5);
        assert!(player.recalculate_volume);
    }

    #[test]
    fn test_out_of_range_target_ignored() {
        let mut state = SequencerState::new(4);
        let before = state.clone();
        let dispatch = state.apply(AudioCmd::new(op::PLAYER_TEMPO, 9, 0, 0, CmdPayload::from_s32(1)), &mut NoHost);
        assert_eq!(dispatch, Dispatch::Continue);
        assert_eq!(state, before);
    }

    #[test]
    fn test_load_and_fade_in() {
        let mut state = SequencerState::new(4);
        state.apply(AudioCmd::new(op::LOAD_SEQUENCE, 1, 12, 0, CmdPayload::from_s32(20)), &mut NoHost);
        let player = &state.players[1];
        assert!(player.enabled);
        assert_eq!(player.state, PlayerState::FadingIn);
        assert_eq!(player.fade_remaining_frames, 20);
    }

    #[test]
    fn test_stop_immediate_or_fade() {
        let mut state = enabled_state();
        state.apply(AudioCmd::new(op::STOP_SEQUENCE, 0, 0, 0, CmdPayload::from_s32(0)), &mut NoHost);
        assert!(!state.players[0].enabled);

        state.apply(AudioCmd::new(op::STOP_SEQUENCE, 1, 0, 0, CmdPayload::from_s32(15)), &mut NoHost);
        assert!(state.players[1].enabled);
        assert_eq!(state.players[1].state, PlayerState::FadingOut);
        assert_eq!(state.players[1].fade_remaining_frames, 15);
    }

    #[test]
    fn test_stop_ignores_disabled_player() {
        let mut state = SequencerState::new(4);
        state.apply(AudioCmd::new(op::STOP_SEQUENCE, 0, 0, 0, CmdPayload::from_s32(15)), &mut NoHost);
        assert_eq!(state.players[0].state, PlayerState::Stopped);
    }

    #[test]
    fn test_global_ops() {
        let mut state = SequencerState::new(4);
        let mut host = RecordingHost::default();

        let dispatch = state.apply(AudioCmd::new(op::MUTE_ALL, 0, 0, 0, CmdPayload(0)), &mut host);
        assert_eq!(dispatch, Dispatch::EndBatch);
        assert!(state.players.iter().all(|p| p.muted && p.recalculate_volume));

        state.apply(AudioCmd::new(op::UNMUTE_ALL, 0, 0, 0, CmdPayload(0)), &mut host);
        assert!(state.players.iter().all(|p| !p.muted));

        state.apply(AudioCmd::new(op::SOUND_MODE, 0, 0, 0, CmdPayload::from_s32(3)), &mut host);
        assert_eq!(state.sound_mode, 3);

        // Global ops ignore the player bound
        state.apply(AudioCmd::new(op::TRIGGER_ACTION, 40, 1, 2, CmdPayload(0)), &mut host);
        assert_eq!(host.actions, vec![(40, 1, 2)]);
    }

    #[test]
    fn test_preload_uses_flags_three() {
        let mut state = SequencerState::new(4);
        let mut host = RecordingHost::default();
        state.apply(AudioCmd::new(op::PRELOAD_SEQUENCE, 0, 7, 0, CmdPayload(0)), &mut host);
        assert_eq!(host.preloads, vec![(7, 3)]);
    }

    #[test]
    fn test_unknown_opcodes_are_padding() {
        let mut state = enabled_state();
        let before = state.clone();
        for op in [0x00, 0x07, 0x3F, 0x42, 0x7F, 0x84, 0xEF] {
            state.apply(AudioCmd::new(op, 0, 0, 0, CmdPayload(0x1234_5678)), &mut NoHost);
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_mute_ends_batch() {
        let ring = std::sync::Arc::new(CommandRing::new());
        let mb = crate::mailbox::Mailbox::with_capacity(4);
        let stats = std::sync::Arc::new(parking_lot::Mutex::new(crate::stats::PortStats::default()));
        let mut queue = crate::command::CommandQueue::new(std::sync::Arc::clone(&ring), mb.clone(), stats);
        queue.enqueue(op::MUTE_ALL, 0, 0, 0, CmdPayload(0));
        queue.enqueue_f32(op::CHANNEL_VOLUME, 0, 0, 0, 0.1);
        queue.publish();

        let mut state = enabled_state();
        let summary = state.process_batch(&ring, mb.poll().unwrap(), &mut NoHost);
        assert_eq!(summary.skipped, 1);
        assert!(state.players[0].muted);
        assert_relative_eq!(state.players[0].channel(0).unwrap().volume, 1.0);
    }

    #[test]
    fn test_second_drain_of_same_range_is_noop() {
        let ring = std::sync::Arc::new(CommandRing::new());
        let mb = crate::mailbox::Mailbox::with_capacity(4);
        let stats = std::sync::Arc::new(parking_lot::Mutex::new(crate::stats::PortStats::default()));
        let mut queue = crate::command::CommandQueue::new(std::sync::Arc::clone(&ring), mb.clone(), stats);
        queue.enqueue_f32(op::CHANNEL_VOLUME, 0, 2, 0, 0.3);
        queue.enqueue_s32(op::PLAYER_TEMPO, 1, 0, 0, 100);
        queue.enqueue_s8(op::PLAYER_TRANSPOSITION, 1, 0, 0, -4);
        queue.publish();
        let range = mb.poll().unwrap();

        let mut state = enabled_state();
        state.process_batch(&ring, range, &mut NoHost);
        assert_eq!(state.players[1].tempo, 100 * 48);
        let after_first = state.clone();

        let summary = state.process_batch(&ring, range, &mut NoHost);
        assert_eq!(summary.applied, 3);
        assert_eq!(state, after_first);
    }
}
