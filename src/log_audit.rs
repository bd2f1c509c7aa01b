// Static scan of every source file for tracing calls that would write
// clinical text (notes, model prompts, raw completions, generated sections)
// into the log stream. Logs carry counts, ids and stage names only.
