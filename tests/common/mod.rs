#![allow(dead_code)]

use vcs_frame::{
  config::Geometry,
  console::Console,
  frame::{ntsc_rgba, FrameBuffer},
  tia::TickCount,
};

pub const STA_WSYNC: [u8; 2] = [0x85, 0x02];
pub const BIT_WSYNC: [u8; 2] = [0x24, 0x02];

/// Counts 40 lines, then writes an incrementing background color at the
/// start of each of the 192 visible lines, then counts 30 lines. Touches
/// nothing but WSYNC and COLUBK.
pub fn band_program() -> Vec<u8> {
  vec![
    0xA0, 0x28,       // F000 Frame: LDY #40
    0x85, 0x02,       // F002 Top:   STA WSYNC
    0x88,             // F004        DEY
    0xD0, 0xFB,       // F005        BNE Top
    0xA2, 0x00,       // F007        LDX #0
    0xA0, 0xC0,       // F009        LDY #192
    0x86, 0x09,       // F00B Vis:   STX COLUBK
    0x85, 0x02,       // F00D        STA WSYNC
    0xE8,             // F00F        INX
    0x88,             // F010        DEY
    0xD0, 0xF8,       // F011        BNE Vis
    0xA0, 0x1E,       // F013        LDY #30
    0x85, 0x02,       // F015 Bot:   STA WSYNC
    0x88,             // F017        DEY
    0xD0, 0xFB,       // F018        BNE Bot
    0x4C, 0x00, 0xF0, // F01A        JMP Frame
  ]
}

/// Full frame kernel: 3 lines of VSYNC, 37 of VBLANK, 192 visible lines
/// colored from a counter at $80, 30 lines of overscan, then the counter
/// is decremented. `sync` is the instruction used to wait for line end in
/// the visible loop.
pub fn rainbow_program(sync: [u8; 2]) -> Vec<u8> {
  vec![
    0x78,             // F000        SEI
    0xD8,             // F001        CLD
    0xA2, 0xFF,       // F002        LDX #$FF
    0x9A,             // F004        TXS
    0xA9, 0x02,       // F005 Next:  LDA #2
    0x85, 0x01,       // F007        STA VBLANK
    0x85, 0x00,       // F009        STA VSYNC
    0x85, 0x02,       // F00B        STA WSYNC
    0x85, 0x02,       // F00D        STA WSYNC
    0x85, 0x02,       // F00F        STA WSYNC
    0xA9, 0x00,       // F011        LDA #0
    0x85, 0x00,       // F013        STA VSYNC
    0xA2, 0x25,       // F015        LDX #37
    0x85, 0x02,       // F017 VBl:   STA WSYNC
    0xCA,             // F019        DEX
    0xD0, 0xFB,       // F01A        BNE VBl
    0xA9, 0x00,       // F01C        LDA #0
    0x85, 0x01,       // F01E        STA VBLANK
    0xA2, 0xC0,       // F020        LDX #192
    0xA4, 0x80,       // F022        LDY $80
    0x84, 0x09,       // F024 Vis:   STY COLUBK
    sync[0], sync[1], // F026        STA/BIT WSYNC
    0xC8,             // F028        INY
    0xCA,             // F029        DEX
    0xD0, 0xF8,       // F02A        BNE Vis
    0xA9, 0x02,       // F02C        LDA #2
    0x85, 0x01,       // F02E        STA VBLANK
    0xA2, 0x1E,       // F030        LDX #30
    0x85, 0x02,       // F032 Over:  STA WSYNC
    0xCA,             // F034        DEX
    0xD0, 0xFB,       // F035        BNE Over
    0xC6, 0x80,       // F037        DEC $80
    0x4C, 0x05, 0xF0, // F039        JMP Next
  ]
}

/// Keeps VBLANK on forever while churning the background color.
pub fn blanked_program() -> Vec<u8> {
  vec![
    0xA9, 0x02,       // F000        LDA #2
    0x85, 0x01,       // F002        STA VBLANK
    0x86, 0x09,       // F004 Loop:  STX COLUBK
    0xE8,             // F006        INX
    0x85, 0x02,       // F007        STA WSYNC
    0x4C, 0x04, 0xF0, // F009        JMP Loop
  ]
}

/// Waits 40 lines, idles 20 NOPs into line 40, then sets the background
/// once. The STA COLUBK cycles span ticks 138..147 of that line, so the
/// write lands on column 147.
pub fn late_color_program() -> Vec<u8> {
  let mut program = vec![
    0xA2, 0x28,       // F000        LDX #40
    0x85, 0x02,       // F002 Top:   STA WSYNC
    0xCA,             // F004        DEX
    0xD0, 0xFB,       // F005        BNE Top
  ];
  program.extend([0xEA; 20]);
  program.extend([
    0xA9, 0x44,       // F01B        LDA #$44
    0x85, 0x09,       // F01D        STA COLUBK
    0x4C, 0x1F, 0xF0, // F01F Halt:  JMP Halt
  ]);
  program
}

/// Raises VSYNC on line 0. The STA VSYNC cycles span ticks 66..75, so sync
/// starts at column 75.
pub fn late_vsync_program() -> Vec<u8> {
  let mut program = vec![0xA9, 0x02]; // F000 LDA #2
  program.extend([0xEA; 10]);
  program.extend([
    0x85, 0x00,       // F00C        STA VSYNC
    0x4C, 0x0E, 0xF0, // F00E Halt:  JMP Halt
  ]);
  program
}

/// Runs one frame as two budgets cut at `split` ticks.
pub fn split_frame(program: &[u8], split: u64) -> Console {
  let frame = Geometry::ntsc().ticks_per_frame();
  let mut console = boot(program);
  console.run_ticks(TickCount::new(split)).unwrap();
  console.run_ticks(TickCount::new(frame - split)).unwrap();
  console
}

pub fn boot(program: &[u8]) -> Console {
  Console::boot_from_bytes(program).unwrap()
}

/// Hex dump of one frame row, one color per pixel run.
pub fn describe_row(lcd: &FrameBuffer, y: usize) -> String {
  lcd.row(y)
    .chunks(4)
    .map(|px| format!("{:02X}{:02X}{:02X}", px[0], px[1], px[2]))
    .collect::<Vec<_>>()
    .join(" ")
}

pub fn uniform_row(lcd: &FrameBuffer, color: u8) -> String {
  let px = ntsc_rgba(color);
  vec![format!("{:02X}{:02X}{:02X}", px[0], px[1], px[2]); lcd.width()].join(" ")
}
