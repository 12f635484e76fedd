#![forbid(unsafe_code)]

//! Built-in hotkey and menu tables. User files are layered on top.

/// Default hotkeys.
pub const DEFAULT_HOTKEYS: &str = "\
[global]
Ctrl+Z          undo
Ctrl+Y          redo
Ctrl+Shift+Z    redo
Ctrl+O          file-open
Ctrl+S          file-save
Ctrl+Shift+S    file-save --path ask
Ctrl+P          pause
Ctrl+R          play-sub
Alt+Left        seek -p=pf; pause on
Alt+Right       seek -p=nf; pause on
Alt+Shift+Left  seek -p=pkf --precise
Alt+Shift+Right seek -p=nkf --precise
Ctrl+G          sub-select ask-number
F5              reload-cmds

[subtitles_grid]
Ctrl+Return     sub-insert --after
Ctrl+Shift+Return sub-insert --before
Delete          sub-delete
Ctrl+D          sub-duplicate
Ctrl+J          sub-merge --concat
Ctrl+Shift+J    sub-merge
Ctrl+K          sub-split -p=cf
Alt+Up          sub-move --above
Alt+Down        sub-move --below
Ctrl+M          sub-move --gui
Up              sub-select one-above
Down            sub-select one-below
Home            sub-select first
End             sub-select last
Ctrl+A          sub-select all
Ctrl+1          sub-set -s=cf
Ctrl+2          sub-set -e=cf
Ctrl+Shift+Up   sub-shift -d=-1f
Ctrl+Shift+Down sub-shift -d=+1f
Ctrl+T          sub-shift -d=ask
Ctrl+/          sub-set --comment
Ctrl+Shift+/    sub-set --no-comment

[spectrogram]
Q               audio-shift-sel -s=-1f
W               audio-shift-sel -s=+1f
E               audio-shift-sel -e=-1f
R               audio-shift-sel -e=+1f
Return          sub-set -s=a.s -e=a.e; sub-select one-below
Space           play-region
Ctrl+Space      play-region -s=a.e -e=a.e+500ms
";

/// Default menus.
pub const DEFAULT_MENU: &str = "\
[main]
&File
  &Open|file-open
  &Save|file-save
  Save &as|file-save --path ask
  -
  Open &recent|!recent!
&Edit
  &Undo|undo
  &Redo|redo
  -
  &Insert after|sub-insert --after
  Insert &before|sub-insert --before
  &Duplicate|sub-duplicate
  &Delete|sub-delete
  -
  &Sort by time|sub-sort
&Timing
  Shift by...|sub-shift -d=ask
  Snap start to video frame|sub-set -s=cf
  Snap end to video frame|sub-set -e=cf
&Plugins
  !plugins!
  -
  &Reload commands|reload-cmds
[subtitles_grid]
&Merge|sub-merge --concat
&Split at video frame|sub-split -p=cf
-
Move &up|sub-move --above
Move &down|sub-move --below
Move &to line...|sub-move --gui
-
Co&mment|sub-set --comment
&Uncomment|sub-set --no-comment
";
