// Prompt templates for résumé screening. The model is addressed in Portuguese,
// matching the résumés and the section headings the parser looks for.

/// Résumé text sent to the model is cut to this many characters.
pub const MAX_RESUME_CHARS: usize = 5000;

/// First `MAX_RESUME_CHARS` characters of `text`, never splitting a code point.
pub fn truncate_resume(text: &str) -> &str {
    match text.char_indices().nth(MAX_RESUME_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Combined prompt answered with `### RESUMO`, `### OPINIÃO` and `### SCORE`.
pub fn analysis_prompt(resume_text: &str, job_context: &str) -> String {
    format!(
        "Você é um analista de currículos. Analise o currículo abaixo para a vaga descrita.

Vaga:
{job_context}

Retorne:
- Um resumo estruturado do currículo em Markdown, com as seções ## Nome Completo, ## Experiência Relevante, ## Habilidades Técnicas, ## Formação Acadêmica e ## Idiomas.
- Uma opinião crítica com base na vaga (alinhamento técnico, gaps e recomendação).
- Uma nota final de 0 a 10 (com uma casa decimal), baseada no alinhamento com a vaga.

Use o seguinte formato:

### RESUMO
(Resumo estruturado em Markdown)

### OPINIÃO
1. Alinhamento Técnico: ...
2. Gaps Técnicos: ...
3. Recomendação Final: Sim / Parcial / Não

### SCORE
(Apenas o número com uma casa decimal)

Currículo:
{}",
        truncate_resume(resume_text)
    )
}
